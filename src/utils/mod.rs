pub mod feature_flags;
pub mod shell;
pub mod temp_artifact;
pub mod text;
