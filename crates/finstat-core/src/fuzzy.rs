//! Fuzzy matching of spreadsheet row/column labels onto canonical fields.

/// Minimum similarity score for a label to be accepted as a field match.
pub const MATCH_THRESHOLD: f64 = 0.75;

/// Score granted when a label contains a synonym verbatim (or vice versa)
/// without being an exact match.
const CONTAINMENT_SCORE: f64 = 0.85;

/// Shortest synonym eligible for containment matching; short tokens like
/// "cash" appear inside too many unrelated labels.
const MIN_CONTAINMENT_LEN: usize = 5;

/// Synonym table mapping canonical field names to the labels financial
/// statements commonly use for them.
const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "revenue",
        &[
            "revenue",
            "total revenue",
            "net revenue",
            "net sales",
            "total sales",
            "sales",
            "turnover",
        ],
    ),
    (
        "cogs",
        &[
            "cost of goods sold",
            "cost of sales",
            "cost of revenue",
            "cogs",
        ],
    ),
    ("gross_profit", &["gross profit", "gross margin"]),
    (
        "operating_expenses",
        &[
            "operating expenses",
            "total operating expenses",
            "opex",
            "selling general and administrative",
        ],
    ),
    ("ebitda", &["ebitda", "adjusted ebitda"]),
    (
        "depreciation_amortization",
        &[
            "depreciation and amortization",
            "depreciation amortization",
            "depreciation",
        ],
    ),
    (
        "ebit",
        &[
            "ebit",
            "operating income",
            "operating profit",
            "income from operations",
        ],
    ),
    ("interest_expense", &["interest expense", "net interest expense"]),
    (
        "tax_expense",
        &[
            "income tax expense",
            "provision for income taxes",
            "tax expense",
        ],
    ),
    (
        "net_income",
        &[
            "net income",
            "net profit",
            "net earnings",
            "profit for the year",
        ],
    ),
    ("total_assets", &["total assets"]),
    ("current_assets", &["total current assets", "current assets"]),
    (
        "cash_and_equivalents",
        &[
            "cash and cash equivalents",
            "cash and equivalents",
            "cash and short term investments",
        ],
    ),
    ("total_liabilities", &["total liabilities"]),
    (
        "current_liabilities",
        &["total current liabilities", "current liabilities"],
    ),
    (
        "total_debt",
        &["total debt", "long term debt", "total borrowings"],
    ),
    (
        "total_equity",
        &[
            "total equity",
            "total stockholders equity",
            "total shareholders equity",
            "shareholders equity",
        ],
    ),
    (
        "operating_cash_flow",
        &[
            "operating cash flow",
            "cash from operations",
            "cash flow from operations",
            "net cash provided by operating activities",
        ],
    ),
    (
        "capital_expenditures",
        &[
            "capital expenditures",
            "capex",
            "purchases of property and equipment",
            "purchase of property plant and equipment",
        ],
    ),
    ("free_cash_flow", &["free cash flow"]),
    (
        "beginning_cash",
        &[
            "cash at beginning of period",
            "beginning cash balance",
            "cash beginning of year",
        ],
    ),
    (
        "ending_cash",
        &[
            "cash at end of period",
            "ending cash balance",
            "cash end of year",
        ],
    ),
    (
        "net_change_in_cash",
        &[
            "net change in cash",
            "net increase in cash",
            "net decrease in cash",
            "change in cash",
        ],
    ),
];

/// A label accepted as a canonical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelMatch {
    pub field: &'static str,
    pub score: f64,
}

/// Edit-distance-based matcher over the synonym table.
#[derive(Debug, Clone, Copy)]
pub struct LabelMatcher {
    threshold: f64,
}

impl Default for LabelMatcher {
    fn default() -> Self {
        Self {
            threshold: MATCH_THRESHOLD,
        }
    }
}

impl LabelMatcher {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Best-scoring canonical field for `label`, if any synonym clears the
    /// acceptance threshold.
    pub fn best_match(&self, label: &str) -> Option<LabelMatch> {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }

        let mut best: Option<LabelMatch> = None;
        for (field, synonyms) in SYNONYMS {
            for synonym in *synonyms {
                let score = similarity(&normalized, synonym);
                if score >= self.threshold
                    && best.map_or(true, |current| score > current.score)
                {
                    best = Some(LabelMatch { field, score });
                }
            }
        }

        best
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_was_space = true;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_owned()
}

fn similarity(label: &str, synonym: &str) -> f64 {
    if label == synonym {
        return 1.0;
    }

    let mut score = strsim::normalized_levenshtein(label, synonym);
    let longer_contains_shorter = (synonym.len() >= MIN_CONTAINMENT_LEN
        && contains_word(label, synonym))
        || (label.len() >= MIN_CONTAINMENT_LEN && contains_word(synonym, label));
    if longer_contains_shorter {
        score = score.max(CONTAINMENT_SCORE);
    }
    score
}

/// Word-boundary containment: "net sales" inside "net sales growth" but not
/// "sales" inside "presales".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.split(' ').count() >= needle.split(' ').count()
        && haystack
            .match_indices(needle)
            .any(|(idx, _)| {
                let before_ok = idx == 0 || haystack.as_bytes()[idx - 1] == b' ';
                let end = idx + needle.len();
                let after_ok = end == haystack.len() || haystack.as_bytes()[end] == b' ';
                before_ok && after_ok
            })
}
