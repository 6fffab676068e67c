/*
    Ambiguity check: parse sample sentences of every non-terminal and look
    for two derivations of the same span
*/

use std::fmt::Display;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::validate::{Grammar, PrepareOptions};
use crate::chart::{ParseOptions, Sentence};
use crate::generator;
use crate::grammar::SymbolId;

#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    // The non-terminal the sentence was parsed from
    pub symbol: String,
    pub text: String,
    pub first: String,
    pub second: String,
}

impl Display for Ambiguity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Symbol `{}` is ambiguous on {:?}: {} and {}",
            self.symbol, self.text, self.first, self.second
        )
    }
}

impl Grammar {
    // Shortest sentence first, then random ones
    fn samples(&self, symbol: SymbolId, options: &PrepareOptions) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        std::iter::once(generator::shortest(self, symbol))
            .chain((0..options.samples).map(|_| generator::generate(self, symbol, &mut rng, options.max_depth)))
            .unique()
            .collect()
    }

    /// Looks for a sentence of some non-terminal with two derivations.
    ///
    /// Only sampled sentences are tried, so passing does not prove the
    /// grammar unambiguous.
    pub fn find_ambiguity(&self, options: &PrepareOptions) -> Result<(), Ambiguity> {
        let parse_options = ParseOptions::default();
        for symbol in self.nonterminals() {
            for text in self.samples(symbol, options) {
                let Ok(mut sentence) = Sentence::new(self, &text) else { continue };
                if let Err(error) = self.parse_sentence_with(&mut sentence, symbol, &parse_options) {
                    log::warn!("ambiguity check skipped {:?}: {}", text, error);
                    continue;
                }
                if let Some((first, second)) = sentence.ambiguous_pair() {
                    return Err(Ambiguity {
                        symbol: self.name(symbol).to_string(),
                        text,
                        first: sentence.derivation(self, first),
                        second: sentence.derivation(self, second),
                    });
                }
            }
        }
        Ok(())
    }
}
