pub mod resolver;
pub mod semver;
