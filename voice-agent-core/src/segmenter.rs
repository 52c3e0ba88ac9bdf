//! トークン列をTTSセグメントへ変換する純粋なステートマシン
//!
//! LLMが生成するトークンを1つずつ受け取り、文字数が `char_budget` に
//! 達するか文末記号(`.`/`!`/`?`/`…`/改行)を含んだ時点でバッファを
//! 確定してセグメントとして払い出す。ネットワークやクロックに一切
//! 依存しないため単体テストしやすい。

const DEFAULT_CHAR_BUDGET: usize = 250;

/// 文末とみなす記号。いずれかがバッファに含まれていれば区切る。
const BOUNDARY_CHARS: [char; 4] = ['.', '!', '?', '…'];

pub struct Segmenter {
    buffer: String,
    char_budget: usize,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::with_char_budget(DEFAULT_CHAR_BUDGET)
    }

    pub fn with_char_budget(char_budget: usize) -> Self {
        Self {
            buffer: String::new(),
            char_budget: char_budget.max(1),
        }
    }

    /// トークンをバッファへ追加する。区切り条件を満たせば確定済みの
    /// セグメントを返し、内部バッファをクリアする。
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.buffer.push_str(token);
        if self.should_cut() {
            self.take_segment()
        } else {
            None
        }
    }

    /// ストリーム終端で呼ぶ。バッファに残った文字列があればセグメント
    /// として払い出す。
    pub fn finish(mut self) -> Option<String> {
        self.take_segment()
    }

    fn should_cut(&self) -> bool {
        self.buffer.chars().count() >= self.char_budget
            || self.buffer.contains(BOUNDARY_CHARS)
            || self.buffer.contains('\n')
    }

    fn take_segment(&mut self) -> Option<String> {
        let trimmed = self.buffer.trim().to_string();
        self.buffer.clear();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_on_punctuation() {
        let mut seg = Segmenter::new();
        assert_eq!(seg.push("Hello"), None);
        assert_eq!(seg.push(" there."), Some("Hello there.".to_string()));
        assert_eq!(seg.push(" More"), None);
        assert_eq!(seg.finish(), Some("More".to_string()));
    }

    #[test]
    fn cuts_on_char_budget() {
        let mut seg = Segmenter::with_char_budget(10);
        assert_eq!(seg.push("0123456789"), Some("0123456789".to_string()));
    }

    #[test]
    fn cuts_on_newline() {
        let mut seg = Segmenter::new();
        assert_eq!(seg.push("line one\n"), Some("line one".to_string()));
    }

    #[test]
    fn empty_tail_yields_nothing() {
        let seg = Segmenter::new();
        assert_eq!(seg.finish(), None);
    }

    #[test]
    fn whitespace_only_token_yields_nothing() {
        let mut seg = Segmenter::new();
        assert_eq!(seg.push("   "), None);
        assert_eq!(seg.finish(), None);
    }

    /// セグメンター則: 払い出された全セグメントを空白1つで結合したもの
    /// (前後の空白を落とす)は、トークン列をそのまま連結してトリムした
    /// ものと一致する。
    #[test]
    fn segmenter_law_concatenation_round_trips() {
        let tokens = ["Hi", " there", ".", " How", " are", " you", "?", " Good", " bye"];
        let mut seg = Segmenter::new();
        let mut segments = Vec::new();
        for tok in tokens {
            if let Some(s) = seg.push(tok) {
                segments.push(s);
            }
        }
        if let Some(tail) = seg.finish() {
            segments.push(tail);
        }

        let reconstructed: String = segments.join(" ");
        let expected: String = tokens.concat().trim().to_string();
        // Segment boundaries may land adjacent to existing whitespace in the
        // source tokens, so normalise runs of whitespace before comparing.
        let normalise = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalise(&reconstructed), normalise(&expected));
    }
}
