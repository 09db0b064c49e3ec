use jieba_rs::Jieba;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Upper bound on keywords kept per text.
pub const MAX_KEYWORDS: usize = 20;

lazy_static! {
    static ref KEYWORD_RE: Regex = Regex::new(r"^[a-zA-Z\x{4e00}-\x{9fa5}]+$").expect("valid regex");
    static ref JIEBA: Jieba = Jieba::new();
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "的","了","在","是","我","有","和","就","不","人","一","上","也","很","到","说","要","去",
            "你","会","着","没有","看","好","自己","这","那","什么","如果","可以","但是","因为","所以",
            "这个","那个","他们","我们","它们","这些","那些","已经","还是","只是","应该","可能","或者",
            "虽然","然后","不过","而且","因此","如何","为什么","哪里","什么时候","怎么样","比如","例如",
            "首先","其次","最后","另外","此外","总之","总的来说",
        ];
        words.iter().copied().collect()
    };
}

/// Splits text into word-like tokens. Implementations may return whitespace
/// and punctuation tokens; filtering happens in [`KeywordExtractor`].
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Dictionary + HMM segmentation for mixed Chinese/Latin text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JiebaSegmenter;

impl Segmenter for JiebaSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        JIEBA.cut(text, true).into_iter().map(str::to_string).collect()
    }
}

/// Dictionary-free segmentation: UAX#29 words for non-CJK runs, overlapping
/// bigrams for runs of CJK ideographs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NgramSegmenter;

impl Segmenter for NgramSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some(first) = rest.chars().next() {
            let cjk = is_cjk(first);
            let split = rest
                .char_indices()
                .find(|(_, c)| is_cjk(*c) != cjk)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (run, tail) = rest.split_at(split);
            if cjk {
                push_bigrams(run, &mut tokens);
            } else {
                tokens.extend(run.unicode_words().map(str::to_string));
            }
            rest = tail;
        }
        tokens
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}')
}

fn push_bigrams(run: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = run.chars().collect();
    if chars.len() < 2 {
        out.push(run.to_string());
        return;
    }
    for pair in chars.windows(2) {
        out.push(pair.iter().collect());
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Whether a single (already trimmed) token may be used as a keyword.
pub fn is_keyword(token: &str) -> bool {
    token.chars().count() >= 2
        && !token.chars().all(char::is_whitespace)
        && !token.chars().all(char::is_numeric)
        && KEYWORD_RE.is_match(token)
        && !is_stopword(token)
}

#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor<S = JiebaSegmenter> {
    segmenter: S,
}

impl<S: Segmenter> KeywordExtractor<S> {
    pub fn new(segmenter: S) -> Self {
        Self { segmenter }
    }

    pub fn segmenter(&self) -> &S {
        &self.segmenter
    }

    /// Extract up to [`MAX_KEYWORDS`] keywords, most frequent first. Ties keep
    /// the order in which the keywords first appear in `text`.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();
        for token in self.segmenter.segment(&normalized) {
            let token = token.trim();
            if !is_keyword(token) { continue; }
            match counts.get_mut(token) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(token.to_string(), 1);
                    first_seen.push(token.to_string());
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = first_seen
            .into_iter()
            .map(|word| {
                let count = counts.get(&word).copied().unwrap_or(0);
                (word, count)
            })
            .collect();
        // sort_by is stable, so equal counts stay in first-seen order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().take(MAX_KEYWORDS).map(|(word, _)| word).collect()
    }
}

/// Keyword extraction with the default jieba segmenter.
pub fn extract_keywords(text: &str) -> Vec<String> {
    KeywordExtractor::new(JiebaSegmenter).extract_keywords(text)
}
