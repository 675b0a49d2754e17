/*
 * Notice of Provisional Patent Filing:
 * The methods and algorithms implemented in this file (specifically relating to
 * Contextual Coherence Fields and relational coherence accumulation) are the
 * subject of a United States Provisional Patent Application (63/988,438)
 * filed on February 23, 2026.
 *
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE and PATENTS.md in the root directory for full details.
 */

//! Topic-domain detection by keyword clusters.
//!
//! A conversation's topic is a coarse cluster id in `0..=63`. The cluster
//! table is configuration: [`TopicClusters::default`] ships 32 hand-authored
//! clusters, and callers may supply their own. What is fixed is the matching
//! procedure:
//!
//! 1. Tokenise: lower-case, split on whitespace, strip leading/trailing
//!    `. , ? ! ; : ' "` from each word.
//! 2. Score each cluster by how many distinct tokens it contains.
//! 3. Highest score wins; ties go to the cluster declared first.
//! 4. No overlap at all → [`MISC_CLUSTER`].
//!
//! No model inference happens here; an optional [`TopicEmbedder`] can be
//! plugged into [`crate::fingerprint::ContextDeriver`] instead.

use hashbrown::HashSet;

/// Highest valid topic cluster id.
pub const MAX_TOPIC_DOMAIN: u8 = 63;

/// Cluster id returned when no keyword matches ("miscellaneous").
pub const MISC_CLUSTER: u8 = 32;

const STRIP_CHARS: &[char] = &['.', ',', '?', '!', ';', ':', '\'', '"'];

/// Lower-cased, punctuation-stripped set of distinct tokens in `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.to_lowercase().trim_matches(STRIP_CHARS).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// One keyword cluster: an id and the words that vote for it.
#[derive(Clone, Debug, PartialEq)]
pub struct KeywordCluster {
    /// Cluster id in `0..=63`.
    pub id: u8,
    /// Lower-case keywords.
    pub keywords: Vec<String>,
}

/// Ordered keyword-cluster table. Declaration order is the tie-break order.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicClusters {
    clusters: Vec<KeywordCluster>,
    fallback: u8,
}

impl TopicClusters {
    /// Build a table from `(id, keywords)` pairs.
    ///
    /// Ids above [`MAX_TOPIC_DOMAIN`] are rejected with `OutOfRange`.
    ///
    /// Declaration order, not id, decides ties: pass clusters in ascending
    /// id order to have the lowest id win.
    pub fn new<I, K, S>(clusters: I) -> crate::error::Result<Self>
    where
        I: IntoIterator<Item = (u32, K)>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for (id, words) in clusters {
            if id > MAX_TOPIC_DOMAIN as u32 {
                return Err(crate::error::CcfError::OutOfRange {
                    field: "topic_domain",
                    value: id,
                    max: MAX_TOPIC_DOMAIN as u32,
                });
            }
            out.push(KeywordCluster {
                id: id as u8,
                keywords: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
            });
        }
        Ok(Self { clusters: out, fallback: MISC_CLUSTER })
    }

    /// Number of clusters in the table.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if the table has no clusters (every text maps to the fallback).
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The cluster id used when nothing matches.
    pub fn fallback(&self) -> u8 {
        self.fallback
    }

    /// Best-matching cluster id for `text`.
    pub fn classify(&self, text: &str) -> u8 {
        self.classify_tokens(&tokenize(text))
    }

    /// Best-matching cluster id for an already tokenised text.
    pub fn classify_tokens(&self, tokens: &HashSet<String>) -> u8 {
        let mut best = self.fallback;
        let mut best_score = 0usize;
        for cluster in &self.clusters {
            let score = cluster
                .keywords
                .iter()
                .filter(|k| tokens.contains(k.as_str()))
                .count();
            // Strictly greater: the first-declared cluster keeps a tie.
            if score > best_score {
                best_score = score;
                best = cluster.id;
            }
        }
        best
    }
}

impl Default for TopicClusters {
    fn default() -> Self {
        let clusters = DEFAULT_CLUSTERS
            .iter()
            .map(|(id, words)| KeywordCluster {
                id: *id,
                keywords: words.iter().map(|w| (*w).to_string()).collect(),
            })
            .collect();
        Self { clusters, fallback: MISC_CLUSTER }
    }
}

/// External topic-embedding collaborator.
///
/// Returns a cluster id in `0..=63`, or `None` when it is unavailable
/// (model not loaded, centroids not computed). Any `None` or out-of-range
/// answer hands the decision back to keyword matching.
pub trait TopicEmbedder: Send + Sync {
    /// Cluster id for `text`, if the embedder can answer.
    fn cluster(&self, text: &str) -> Option<u8>;
}

// Built-in table: 8 themes × 4 clusters.
const DEFAULT_CLUSTERS: &[(u8, &[&str])] = &[
    // Finance & money
    (0, &["finance", "money", "invest", "stock", "market", "budget", "saving", "wealth",
          "portfolio", "dividend", "compound", "interest", "bond", "fund", "personal",
          "financial"]),
    (1, &["tax", "taxation", "irs", "deduction", "filing", "return", "income", "withhold"]),
    (2, &["estate", "inheritance", "will", "trust", "beneficiary", "probate", "planning",
          "heir"]),
    (3, &["crypto", "bitcoin", "ethereum", "blockchain", "defi", "nft", "token", "wallet",
          "cryptocurrency"]),
    // Health & wellness
    (4, &["health", "exercise", "fitness", "gym", "workout", "diet", "nutrition", "weight",
          "run", "yoga", "meditat"]),
    (5, &["medical", "doctor", "symptom", "diagnosis", "treatment", "medication", "hospital",
          "surgery", "therapy"]),
    (6, &["mental", "anxiety", "depression", "stress", "counseling", "psychology", "mindful",
          "emotional", "wellbeing"]),
    (7, &["sleep", "insomnia", "rest", "fatigue", "tired", "nap", "circadian"]),
    // Technology
    (8, &["code", "programming", "software", "developer", "python", "javascript", "rust",
          "algorithm", "debug", "git"]),
    (9, &["ai", "artificial", "intelligence", "machine", "learning", "neural", "model", "llm",
          "gpt", "claude"]),
    (10, &["robot", "autonomous", "sensor", "embedded", "hardware", "microcontroller"]),
    (11, &["cloud", "aws", "azure", "gcp", "kubernetes", "docker", "devops", "deploy"]),
    // Relationships & social
    (12, &["relationship", "partner", "dating", "marriage", "divorce", "breakup", "love",
           "romance", "attraction"]),
    (13, &["family", "parent", "child", "sibling", "mother", "father", "children"]),
    (14, &["friend", "friendship", "social", "community", "networking", "connection"]),
    (15, &["conflict", "argument", "disagree", "boundary", "communication", "assertive"]),
    // Career & work
    (16, &["career", "job", "work", "resume", "interview", "salary", "promotion", "workplace",
           "professional"]),
    (17, &["startup", "entrepreneur", "business", "venture", "founder", "company"]),
    (18, &["management", "leadership", "team", "meeting", "productivity", "agile"]),
    (19, &["creative", "design", "art", "write", "writing", "author", "paint", "draw"]),
    // Education
    (20, &["study", "learn", "course", "university", "school", "education", "degree"]),
    (21, &["science", "research", "experiment", "hypothesis", "data", "analysis"]),
    (22, &["math", "calculus", "algebra", "statistic", "probability", "number"]),
    (23, &["history", "historical", "ancient", "civilization", "war", "empire"]),
    // Lifestyle
    (24, &["food", "cook", "recipe", "restaurant", "eat", "cuisine", "meal"]),
    (25, &["travel", "trip", "vacation", "flight", "hotel", "country", "abroad"]),
    (26, &["home", "house", "interior", "renovate", "garden", "decor", "furniture"]),
    (27, &["hobby", "game", "sport", "music", "movie", "book", "entertainment"]),
    // Philosophy & values
    (28, &["philosophy", "ethics", "moral", "value", "meaning", "purpose", "existential"]),
    (29, &["religion", "spiritual", "faith", "belief", "prayer", "god", "universe"]),
    (30, &["politic", "government", "policy", "vote", "democracy", "election"]),
    (31, &["environment", "climate", "sustainable", "eco", "green", "carbon"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation_and_case() {
        let t = tokenize("What is Compound INTEREST? \"Money\", please!");
        assert!(t.contains("compound"));
        assert!(t.contains("interest"));
        assert!(t.contains("money"));
        assert!(t.contains("please"));
        assert!(!t.contains("interest?"));
    }

    #[test]
    fn test_default_table_shape() {
        let table = TopicClusters::default();
        assert_eq!(table.len(), 32);
        assert_eq!(table.fallback(), MISC_CLUSTER);
    }

    #[test]
    fn test_finance_text_maps_to_cluster_0() {
        let table = TopicClusters::default();
        assert_eq!(table.classify("What is compound interest?"), 0);
    }

    #[test]
    fn test_crypto_text_maps_to_cluster_3() {
        let table = TopicClusters::default();
        assert_eq!(table.classify("Should I buy bitcoin or ethereum?"), 3);
    }

    #[test]
    fn test_no_match_is_miscellaneous() {
        let table = TopicClusters::default();
        assert_eq!(table.classify("hello there"), MISC_CLUSTER);
        assert_eq!(table.classify(""), MISC_CLUSTER);
    }

    #[test]
    fn test_higher_overlap_beats_declaration_order() {
        // "trust" votes for cluster 2 once; "bitcoin wallet" votes for 3 twice.
        let table = TopicClusters::default();
        assert_eq!(table.classify("trust my bitcoin wallet"), 3);
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        let table = TopicClusters::new([(7u32, vec!["apple"]), (2u32, vec!["pear"])]).unwrap();
        assert_eq!(table.classify("apple pear"), 7);

        let reversed = TopicClusters::new([(2u32, vec!["pear"]), (7u32, vec!["apple"])]).unwrap();
        assert_eq!(reversed.classify("apple pear"), 2);
    }

    #[test]
    fn test_default_table_ties_favour_lowest_id() {
        let ids: Vec<u8> = DEFAULT_CLUSTERS.iter().map(|(id, _)| *id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "default table not in id order: {:?}", ids);
        // "tax" votes for 1, "crypto" for 3: one each, lower id wins.
        assert_eq!(TopicClusters::default().classify("crypto tax"), 1);
    }

    #[test]
    fn test_repeated_token_counts_once() {
        let table = TopicClusters::new([(1u32, vec!["tax"]), (5u32, vec!["doctor", "hospital"])])
            .unwrap();
        assert_eq!(table.classify("tax tax tax doctor hospital"), 5);
    }

    #[test]
    fn test_custom_table_rejects_out_of_range_id() {
        let err = TopicClusters::new([(64u32, vec!["x"])]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CcfError::OutOfRange { field: "topic_domain", value: 64, .. }
        ));
    }
}
