//! Query expression builder and title term counter / 查询表达式构建与标题词频
//!
//! FTS5 MATCH syntax is touchy about punctuation, so user input is reduced to
//! word characters before it reaches the engine. The title splitter for the
//! popular-terms endpoint stays engine-neutral: backend tokenizers disagree
//! on CJK text, counting in-process sidesteps that. / 标题分词与引擎无关

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::WordFrequency;

/// Tokens shorter than this are dropped, both by the FTS query builder and
/// the popularity counter. / 最短保留词长
const MIN_TOKEN_LEN: usize = 2;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Build an FTS5 MATCH expression from a raw user query. / 构建FTS5查询表达式
///
/// Strips everything that is not a word character or whitespace, splits on
/// whitespace, drops tokens shorter than 2 chars, quotes each survivor as a
/// prefix match (`"tok"*`) and joins with AND. Returns `None` when nothing
/// survives, so callers can skip the database round-trip entirely.
pub fn build_match_query(raw: &str) -> Option<String> {
    let cleaned = NON_WORD.replace_all(raw, " ");
    let tokens: Vec<String> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(|t| format!("\"{}\"*", t))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" AND "))
    }
}

/// Separators for the popularity counter: whitespace plus common ASCII
/// punctuation and the full-width CJK equivalents. / 空白 + 中英文标点
const TITLE_SEPARATORS: &[char] = &[
    ',', '.', '!', '?', '|', '/', ':', ';',
    '，', '。', '！', '？', '｜', '／', '：', '；', '、',
];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || TITLE_SEPARATORS.contains(&c)
}

/// Split one title into lowercased terms / 拆分标题词条
pub fn title_terms(title: &str) -> Vec<String> {
    title
        .split(is_separator)
        .map(|t| t.trim().to_lowercase())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Count term frequencies over titles and keep the top `limit`. Ties are
/// broken by the term itself so a fixed corpus always yields the same
/// result. / 统计词频，平局按词排序保证确定性
pub fn top_terms<I, S>(titles: I, limit: usize) -> Vec<WordFrequency>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for title in titles {
        for term in title_terms(title.as_ref()) {
            *counts.entry(term).or_default() += 1;
        }
    }

    let mut terms: Vec<WordFrequency> = counts
        .into_iter()
        .map(|(word, frequency)| WordFrequency { word, frequency })
        .collect();
    terms.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.word.cmp(&b.word))
    });
    terms.truncate(limit);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_query_quotes_prefix_tokens() {
        assert_eq!(
            build_match_query("Introduction to Rust"),
            Some(r#""Introduction"* AND "to"* AND "Rust"*"#.to_string())
        );
    }

    #[test]
    fn match_query_strips_punctuation() {
        assert_eq!(
            build_match_query("rust, (async)!"),
            Some(r#""rust"* AND "async"*"#.to_string())
        );
    }

    #[test]
    fn match_query_drops_short_tokens() {
        // single-char token alone yields no expression at all
        assert_eq!(build_match_query("k"), None);
        assert_eq!(
            build_match_query("k kubernetes"),
            Some(r#""kubernetes"*"#.to_string())
        );
    }

    #[test]
    fn match_query_empty_input() {
        assert_eq!(build_match_query(""), None);
        assert_eq!(build_match_query("   "), None);
        assert_eq!(build_match_query("!!! ??"), None);
    }

    #[test]
    fn match_query_keeps_cjk() {
        assert_eq!(build_match_query("搜索引擎"), Some(r#""搜索引擎"*"#.to_string()));
    }

    #[test]
    fn title_terms_split_on_cjk_punctuation() {
        assert_eq!(title_terms("入门教程，进阶／实战。结束"), vec!["入门教程", "进阶", "实战", "结束"]);
        assert_eq!(title_terms("Intro|Part1/Part2: End"), vec!["intro", "part1", "part2", "end"]);
    }

    #[test]
    fn title_terms_lowercase_and_min_len() {
        assert_eq!(title_terms("Rust Tips a b"), vec!["rust", "tips"]);
    }

    #[test]
    fn top_terms_counts_and_orders() {
        let titles = ["ab cd", "ab ef", "cd ef", "gh"];
        let terms = top_terms(titles, 3);
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0], WordFrequency { word: "ab".into(), frequency: 2 });
        assert_eq!(terms[1], WordFrequency { word: "cd".into(), frequency: 2 });
        assert_eq!(terms[2], WordFrequency { word: "ef".into(), frequency: 2 });
    }

    #[test]
    fn top_terms_drops_single_char_terms() {
        // "a b", "a c", "b c", "d": every term is one char, nothing survives
        let terms = top_terms(["a b", "a c", "b c", "d"], 3);
        assert!(terms.is_empty());
    }

    #[test]
    fn top_terms_is_deterministic() {
        let titles = ["rust tips", "rust tricks", "zig tips"];
        let first = top_terms(titles, 10);
        let second = top_terms(titles, 10);
        assert_eq!(first, second);
        // rust and tips tie at 2, rust wins alphabetically
        assert_eq!(first[0].word, "rust");
        assert_eq!(first[0].frequency, 2);
    }
}
