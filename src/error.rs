#[derive(thiserror::Error, Debug)]
pub enum MapError {
    #[error("received height field with 0 size in x direction")]
    EmptyHeightField,

    #[error("generator is fixed at {x} x {y} samples")]
    FixedSize { x: usize, y: usize },

    #[error("unknown generator property `{0}`")]
    UnknownProperty(String),

    #[error("invalid chunk size {0}")]
    InvalidChunkSize(i64),

    #[error("tile shape `{0}` is already registered")]
    DuplicateShape(String),

    #[error("malformed map data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    pub fn malformed<T: ToString>(msg: T) -> Self {
        MapError::Malformed(msg.to_string())
    }
}
