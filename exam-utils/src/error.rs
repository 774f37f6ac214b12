#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unable to satisfy the requested distribution with the available questions.")]
    EmptySelection,
    #[error("{0}")]
    Generation(String),
    #[error("{0}")]
    Transform(String),
}
