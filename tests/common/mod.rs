#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rigstate::config::Config;

/// Stand-in for the external store tool.
///
/// Records live at `$BEADS_DIR/records/<id>.json`; the merge slot lives in
/// `<state>/slot`. Every call is appended to `<state>/calls.log` as
/// `<BEADS_DIR or none> <args...>`.
const FAKE_TOOL: &str = r#"#!/bin/sh
STATE='@STATE@'
echo "${BEADS_DIR:-none} $*" >> "$STATE/calls.log"

while [ $# -gt 0 ]; do
  case "$1" in
    --allow-stale) shift ;;
    --db) shift 2 ;;
    *) break ;;
  esac
done

cmd="$1"
shift

slot="$STATE/slot"

slot_status() {
  h=""
  [ -f "$slot/holder" ] && h=$(cat "$slot/holder")
  w=""
  if [ -f "$slot/waiters" ]; then
    while IFS= read -r x; do
      [ -n "$w" ] && w="$w,"
      w="$w\"$x\""
    done < "$slot/waiters"
  fi
  if [ -n "$h" ]; then
    printf '{"id":"gt-merge-slot","available":false,"holder":"%s","waiters":[%s]}\n' "$h" "$w"
  else
    printf '{"id":"gt-merge-slot","available":true,"waiters":[%s]}\n' "$w"
  fi
}

case "$cmd" in
  init)
    mkdir -p .state
    exit 0
    ;;
  show)
    f="$BEADS_DIR/records/$1.json"
    if [ -n "$BEADS_DIR" ] && [ -f "$f" ]; then
      printf '[%s]\n' "$(cat "$f")"
      exit 0
    fi
    echo "Error: Issue not found: $1" >&2
    exit 1
    ;;
  warn-only)
    echo "warning: database is stale" >&2
    exit 0
    ;;
  merge-slot)
    sub="$1"
    shift
    holder=""
    wait=0
    for a in "$@"; do
      case "$a" in
        --holder=*) holder="${a#--holder=}" ;;
        --wait) wait=1 ;;
      esac
    done
    case "$sub" in
      create)
        if [ -d "$slot" ]; then
          echo "Error: merge slot already exists" >&2
          exit 1
        fi
        mkdir -p "$slot"
        printf '{"id":"gt-merge-slot"}\n'
        ;;
      check)
        if [ ! -d "$slot" ]; then
          echo "Error: merge slot not found" >&2
          exit 1
        fi
        slot_status
        ;;
      acquire)
        if [ ! -d "$slot" ]; then
          echo "Error: merge slot not found" >&2
          exit 1
        fi
        if [ -s "$slot/holder" ]; then
          [ "$wait" = 1 ] && echo "$holder" >> "$slot/waiters"
          slot_status
          echo "slot held by $(cat "$slot/holder")" >&2
          exit 1
        fi
        printf '%s' "$holder" > "$slot/holder"
        slot_status
        ;;
      release)
        cur=""
        [ -f "$slot/holder" ] && cur=$(cat "$slot/holder")
        if [ -n "$holder" ] && [ "$holder" != "$cur" ]; then
          printf '{"released":false,"error":"slot held by %s, not %s"}\n' "$cur" "$holder"
          exit 1
        fi
        rm -f "$slot/holder"
        printf '{"released":true}\n'
        ;;
    esac
    ;;
  *)
    echo "unknown command: $cmd" >&2
    exit 2
    ;;
esac
"#;

pub struct FakeTool {
    pub script: PathBuf,
    pub state: PathBuf,
}

impl FakeTool {
    /// Write the fake tool under `root/.fake-tool`.
    pub fn install(root: &Path) -> Self {
        let state = root.join(".fake-tool");
        fs::create_dir_all(&state).unwrap();
        let script = state.join("bd.sh");
        let body = FAKE_TOOL.replace("@STATE@", &state.display().to_string());
        fs::write(&script, body).unwrap();
        Self { script, state }
    }

    /// Run through `/bin/sh` so the freshly written script is never exec'd
    /// directly.
    pub fn config(&self) -> Config {
        Config {
            program: PathBuf::from("/bin/sh"),
            global_args: vec![self.script.display().to_string(), "--allow-stale".into()],
            ..Config::default()
        }
    }

    /// Point a town at the fake tool through its config file.
    pub fn write_town_config(&self, town: &Path) {
        let config = self.config();
        fs::create_dir_all(town.join("mayor")).unwrap();
        fs::write(
            town.join(rigstate::config::CONFIG_FILE),
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.state.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// A town with one unit (`gastown`) owning a database-backed store, and a
/// crew worktree at `gastown/crew/max`.
pub fn build_town(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("mayor")).unwrap();
    fs::write(root.join("mayor/town.json"), "{}").unwrap();
    fs::create_dir_all(root.join(".state")).unwrap();
    fs::create_dir_all(root.join("gastown/.state")).unwrap();
    fs::write(root.join("gastown/.state/beads.db"), "").unwrap();
    let worktree = root.join("gastown/crew/max");
    fs::create_dir_all(&worktree).unwrap();
    worktree
}

pub fn write_record(store: &Path, id: &str, title: &str) {
    let records = store.join("records");
    fs::create_dir_all(&records).unwrap();
    fs::write(
        records.join(format!("{id}.json")),
        serde_json::json!({ "id": id, "title": title, "status": "open" }).to_string(),
    )
    .unwrap();
}
