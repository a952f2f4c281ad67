//! テキスト正規化とストップワード。
pub mod stop_words;
pub mod tokenizer;

pub use stop_words::{ENGLISH_STOP_WORDS, StopWords};
pub use tokenizer::Tokenizer;
