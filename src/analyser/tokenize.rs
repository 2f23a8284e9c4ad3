//! Word segmentation of an accepted keystroke chain.
use super::containers::PacketRecord;

/// Assigns every keystroke a word index. Indices start at 0 and never decrease; the
/// keystroke that types a space belongs to the word it ends.
pub trait WordTokenizer {
    fn tokenize(&self, keystrokes: &[PacketRecord], rule: &str, max_word_len: usize) -> Vec<usize>;
}

/// Treats a keystroke whose request grew by exactly `space_delta` bytes as a typed space,
/// and splits any word that would exceed `max_word_len` characters.
pub struct DeltaTokenizer {
    pub space_delta: i64,
}

impl WordTokenizer for DeltaTokenizer {
    fn tokenize(&self, keystrokes: &[PacketRecord], _rule: &str, max_word_len: usize) -> Vec<usize> {
        let mut tokens = Vec::with_capacity(keystrokes.len());
        let mut token = 0;
        let mut word_len = 0;
        let mut previous: Option<i64> = None;

        for keystroke in keystrokes {
            let length = keystroke.frame_length as i64;
            let is_space = previous.is_some_and(|p| length - p == self.space_delta);
            previous = Some(length);

            if word_len >= max_word_len && !is_space {
                token += 1;
                word_len = 0;
            }
            tokens.push(token);
            if is_space {
                token += 1;
                word_len = 0;
            } else {
                word_len += 1;
            }
        }

        tokens
    }
}

/// Characters per word. Every word but the last also holds its terminating space
/// keystroke, which is not a character.
pub fn word_lengths(tokens: &[usize]) -> Vec<i64> {
    let Some(&max_token) = tokens.iter().max() else {
        return Vec::new();
    };
    let mut lengths = vec![-1i64; max_token];
    lengths.push(0);
    for &token in tokens {
        lengths[token] += 1;
    }
    lengths
}

/// Regular expression matching candidate queries, one `[\w-]{n}` per word.
pub fn query_pattern(word_lengths: &[i64]) -> String {
    word_lengths
        .iter()
        .map(|n| format!("[\\w-]{{{n}}}"))
        .collect::<Vec<_>>()
        .join(" ")
}
