//! System name classification.
//!
//! Procedurally generated catalogue names (`Synuefe XR-H d11-102`) carry
//! their identity in the name itself: the trailing code fields pack into a
//! stable integer, so no name row is stored for them. Hand-assigned names
//! (`Sol`, `Beagle Point`) are custom and need an allocated identifier in
//! the names table.

use std::fmt;

use thiserror::Error;

/// Sector assigned to single-word custom names, which carry no prefix of
/// their own.
pub const NO_SECTOR: &str = "NoSectorName";

/// Marker bit distinguishing packed procedural ids from allocated ones.
const STANDARD_MARK: i64 = 1 << 62;

const N1_MAX: i64 = (1 << 12) - 1;
const N2_MAX: i64 = (1 << 24) - 1;

/// Identity of a classified system name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClass {
    /// Procedurally generated; the id derives from the name and needs no
    /// stored row.
    Standard {
        /// Packed stable identifier, tagged with a marker bit so it can
        /// never collide with a sequentially allocated custom id.
        id: i64,
    },
    /// Hand-assigned; a names-table row must be allocated for it.
    Custom,
}

impl NameClass {
    /// Whether the name was recognised as procedurally generated.
    #[must_use]
    pub const fn is_standard(&self) -> bool {
        matches!(self, Self::Standard { .. })
    }
}

/// A system name split into its sector prefix and star remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedName {
    /// Standard or custom identity.
    pub class: NameClass,
    /// Normalised sector name the system belongs to.
    pub sector: String,
    /// Remainder of the name; for custom names this is the part stored in
    /// the names table.
    pub star: String,
}

impl fmt::Display for ClassifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sector == NO_SECTOR {
            write!(f, "{}", self.star)
        } else {
            write!(f, "{} {}", self.sector, self.star)
        }
    }
}

/// Errors raised while classifying a system name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameClassifyError {
    /// The name was empty or whitespace-only.
    #[error("system name is empty")]
    Empty,
}

/// Splits system names into sector and star parts and derives their
/// identity.
pub trait NameClassifier {
    /// Classify one system name.
    ///
    /// # Errors
    /// Returns [`NameClassifyError`] when the name cannot be classified at
    /// all; unrecognised shapes are not errors, they classify as custom.
    fn classify(&self, name: &str) -> Result<ClassifiedName, NameClassifyError>;
}

/// Default classifier for procedurally generated catalogue names.
///
/// Recognises `<sector words> LL-L M<n1>-<n2>` (the `<n1>-` part may be
/// omitted when zero). Everything else is custom: multi-word names use all
/// but the last word as the sector, single-word names fall into
/// [`NO_SECTOR`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcgenClassifier;

impl NameClassifier for ProcgenClassifier {
    fn classify(&self, name: &str) -> Result<ClassifiedName, NameClassifyError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NameClassifyError::Empty);
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let count = tokens.len();
        if count >= 3
            && let Some(id) = pack_procgen(tokens[count - 2], tokens[count - 1])
        {
            return Ok(ClassifiedName {
                class: NameClass::Standard { id },
                sector: tokens[..count - 2].join(" "),
                star: format!("{} {}", tokens[count - 2], tokens[count - 1]),
            });
        }

        if count >= 2 {
            Ok(ClassifiedName {
                class: NameClass::Custom,
                sector: tokens[..count - 1].join(" "),
                star: tokens[count - 1].to_owned(),
            })
        } else {
            Ok(ClassifiedName {
                class: NameClass::Custom,
                sector: NO_SECTOR.to_owned(),
                star: trimmed.to_owned(),
            })
        }
    }
}

/// Pack the `LL-L` code and `M<n1>-<n2>` suffix into a stable id.
///
/// Field layout: letters in bits 0..15, mass code in bits 15..18, first
/// number in bits 18..30, second number in bits 30..54, marker in bit 62.
fn pack_procgen(code: &str, suffix: &str) -> Option<i64> {
    let &[l1, l2, b'-', l3] = code.as_bytes() else {
        return None;
    };
    if !(l1.is_ascii_uppercase() && l2.is_ascii_uppercase() && l3.is_ascii_uppercase()) {
        return None;
    }

    let mass = *suffix.as_bytes().first()?;
    if !(b'a'..=b'h').contains(&mass) {
        return None;
    }
    let numbers = suffix.get(1..)?;
    let (n1, n2) = match numbers.split_once('-') {
        Some((first, second)) => (first.parse::<i64>().ok()?, second.parse::<i64>().ok()?),
        None => (0, numbers.parse::<i64>().ok()?),
    };
    if n1 > N1_MAX || n2 > N2_MAX {
        return None;
    }

    Some(
        STANDARD_MARK
            | i64::from(l1 - b'A')
            | i64::from(l2 - b'A') << 5
            | i64::from(l3 - b'A') << 10
            | i64::from(mass - b'a') << 15
            | n1 << 18
            | n2 << 30,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classify(name: &str) -> ClassifiedName {
        ProcgenClassifier
            .classify(name)
            .expect("classification should succeed")
    }

    #[rstest]
    fn recognises_procgen_names() {
        let classified = classify("Synuefe XR-H d11-102");
        assert!(classified.class.is_standard());
        assert_eq!(classified.sector, "Synuefe");
        assert_eq!(classified.star, "XR-H d11-102");
        assert_eq!(classified.to_string(), "Synuefe XR-H d11-102");
    }

    #[rstest]
    fn procgen_ids_carry_the_marker_bit() {
        for name in ["Synuefe XR-H d11-102", "Col 285 Sector XJ-A c1-12"] {
            let NameClass::Standard { id } = classify(name).class else {
                panic!("{name} should classify as standard");
            };
            assert!(id & STANDARD_MARK != 0);
            assert!(id > 0);
        }
    }

    #[rstest]
    fn distinct_procgen_names_get_distinct_ids() {
        let ids: Vec<i64> = [
            "Synuefe XR-H d11-102",
            "Synuefe XR-H d11-103",
            "Synuefe XR-H c11-102",
            "Synuefe XR-G d11-102",
            "Synuefe XR-H d102",
        ]
        .iter()
        .map(|name| match classify(name).class {
            NameClass::Standard { id } => id,
            NameClass::Custom => panic!("{name} should classify as standard"),
        })
        .collect();
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }

    #[rstest]
    fn omitted_first_number_means_zero() {
        let short = classify("Synuefe XR-H d102");
        let explicit = classify("Synuefe XR-H d0-102");
        assert_eq!(short.class, explicit.class);
    }

    #[rstest]
    fn multi_word_sector_prefixes_are_kept_whole() {
        let classified = classify("Col 285 Sector XJ-A c1-12");
        assert_eq!(classified.sector, "Col 285 Sector");
    }

    #[rstest]
    #[case("Sol", NO_SECTOR, "Sol")]
    #[case("Beagle Point", "Beagle", "Point")]
    #[case("HIP 36601", "HIP", "36601")]
    // Mass code out of range falls back to custom.
    #[case("Foo AB-C z1-2", "Foo AB-C", "z1-2")]
    fn custom_names_split_on_the_last_word(
        #[case] name: &str,
        #[case] sector: &str,
        #[case] star: &str,
    ) {
        let classified = classify(name);
        assert_eq!(classified.class, NameClass::Custom);
        assert_eq!(classified.sector, sector);
        assert_eq!(classified.star, star);
        assert_eq!(classified.to_string(), name);
    }

    #[rstest]
    fn empty_names_are_rejected() {
        assert_eq!(
            ProcgenClassifier.classify("   "),
            Err(NameClassifyError::Empty)
        );
    }
}
