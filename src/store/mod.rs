pub mod paths;
pub mod provision;
pub mod redirect;
pub mod routes;
pub mod town;
