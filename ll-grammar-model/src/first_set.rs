use crate::model::{TokenKind, TokenSeq};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;

/// The token sequences of length `<= k` an expansion can begin with.
///
/// Sequences shorter than `k` are complete derivations; the empty derivation is
/// not stored as a sequence but as the `nullable` marker. Sets are ordered so
/// that every rendering of them is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FirstKSet {
    sequences: BTreeSet<TokenSeq>,
    nullable: bool,
}

impl FirstKSet {
    /// Matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Matches only the empty string.
    pub fn epsilon() -> Self {
        Self {
            sequences: BTreeSet::new(),
            nullable: true,
        }
    }

    pub fn token(kind: impl Into<TokenKind>) -> Self {
        let mut sequences = BTreeSet::new();
        sequences.insert(vec![kind.into()]);
        Self {
            sequences,
            nullable: false,
        }
    }

    pub fn from_sequences<I>(sequences: I, nullable: bool) -> Self
    where
        I: IntoIterator<Item = TokenSeq>,
    {
        Self {
            sequences: sequences.into_iter().filter(|s| !s.is_empty()).collect(),
            nullable,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    /// No sequence and no empty marker.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty() && !self.nullable
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenSeq> {
        self.sequences.iter()
    }

    pub fn contains(&self, seq: &[TokenKind]) -> bool {
        if seq.is_empty() {
            self.nullable
        } else {
            self.sequences.contains(seq)
        }
    }

    pub fn union_with(&mut self, other: &FirstKSet) {
        self.sequences.extend(other.sequences.iter().cloned());
        self.nullable |= other.nullable;
    }

    pub fn union(mut self, other: &FirstKSet) -> FirstKSet {
        self.union_with(other);
        self
    }

    /// `self` followed by `other`, truncated at `k`.
    ///
    /// Sequences of `self` that already reached `k` are kept as they are; the
    /// shorter ones are extended by every sequence of `other`, and kept alone
    /// when `other` can be empty.
    pub fn concat(&self, other: &FirstKSet, k: usize) -> FirstKSet {
        let mut sequences = BTreeSet::new();
        for prefix in &self.sequences {
            if prefix.len() >= k {
                sequences.insert(prefix[..k].to_vec());
                continue;
            }
            for suffix in &other.sequences {
                let mut seq = prefix.clone();
                seq.extend(suffix.iter().take(k - prefix.len()).cloned());
                sequences.insert(seq);
            }
            if other.nullable {
                sequences.insert(prefix.clone());
            }
        }
        if self.nullable {
            sequences.extend(
                other
                    .sequences
                    .iter()
                    .map(|s| s.iter().take(k).cloned().collect::<TokenSeq>()),
            );
        }
        FirstKSet {
            sequences,
            nullable: self.nullable && other.nullable,
        }
    }

    pub fn truncate(&self, k: usize) -> FirstKSet {
        FirstKSet {
            sequences: self
                .sequences
                .iter()
                .map(|s| s.iter().take(k).cloned().collect())
                .filter(|s: &TokenSeq| !s.is_empty())
                .collect(),
            nullable: self.nullable,
        }
    }

    /// Whether some sequence of the set is a prefix of the upcoming tokens.
    ///
    /// The empty marker is not consulted: an empty match is the decision
    /// procedure's default, not a lookahead match.
    pub fn matches<S: AsRef<str>>(&self, upcoming: &[S]) -> bool {
        self.sequences.iter().any(|seq| {
            seq.len() <= upcoming.len()
                && seq.iter().zip(upcoming).all(|(a, b)| a == b.as_ref())
        })
    }

    /// Sequences on which the two sets cannot be told apart: pairs where one is
    /// a prefix of the other. The shorter member of each pair is reported.
    pub fn conflicts(&self, other: &FirstKSet) -> BTreeSet<TokenSeq> {
        let mut shared = BTreeSet::new();
        for a in &self.sequences {
            for b in &other.sequences {
                let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
                if long.starts_with(short) {
                    shared.insert(short.clone());
                }
            }
        }
        shared
    }

    pub fn overlaps(&self, other: &FirstKSet) -> bool {
        !self.conflicts(other).is_empty()
    }
}

pub fn display_sequence(seq: &[TokenKind]) -> String {
    format!("[{}]", seq.iter().join(" "))
}

pub fn display_sequences<'a, I>(seqs: I) -> String
where
    I: IntoIterator<Item = &'a TokenSeq>,
{
    seqs.into_iter().map(|s| display_sequence(s)).join(", ")
}

impl fmt::Display for FirstKSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}", display_sequences(&self.sequences))?;
        if self.nullable {
            if !self.sequences.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "ε")?;
        }
        write!(f, "}}")
    }
}
