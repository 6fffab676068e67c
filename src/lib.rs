pub mod analysis;
pub mod chart;
pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod parser;

pub use analysis::ambiguity::Ambiguity;
pub use analysis::validate::{Grammar, PrepareOptions};
pub use analysis::{AnalyzedGrammar, GrammarError, GrammarErrorType};
pub use chart::{ParseError, ParseOptions, Sentence, Syntagm, SyntagmId};
pub use grammar::{RawGrammar, RuleId, SymbolId};
