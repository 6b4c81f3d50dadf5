use thiserror::Error;

#[derive(Error, Debug)]
pub enum JavaParseError {
    #[error("Failed to load Java grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Parser produced no syntax tree for {0}")]
    NoTree(String),
}

pub type Result<T> = std::result::Result<T, JavaParseError>;
