use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string that does not name any variant of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum whose serde names, `as_str` and `FromStr` all share one
/// spelling, so the database and the wire can never disagree.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $( $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok($name::$variant), )+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

wire_enum! {
    /// What kind of baby item a listing is.
    Category as "category" {
        Beds => "beds",
        Clothing => "clothing",
        Toys => "toys",
        Furniture => "furniture",
        Strollers => "strollers",
        CarSeats => "car-seats",
        Feeding => "feeding",
        Bathing => "bathing",
        Monitors => "monitors",
        Books => "books",
        Other => "other",
    }
}

wire_enum! {
    Condition as "condition" {
        New => "new",
        LikeNew => "like-new",
        Good => "good",
        Fair => "fair",
    }
}

wire_enum! {
    /// Cities served in the Geneva/Lausanne region.
    Location as "location" {
        Geneva => "Geneva",
        Lausanne => "Lausanne",
        Montreux => "Montreux",
        Vevey => "Vevey",
        Nyon => "Nyon",
        Morges => "Morges",
        YverdonLesBains => "Yverdon-les-Bains",
        Other => "Other",
    }
}

wire_enum! {
    AgeRange as "age range" {
        ZeroToSixMonths => "0-6 months",
        SixToTwelveMonths => "6-12 months",
        OneToTwoYears => "1-2 years",
        TwoToThreeYears => "2-3 years",
        ThreePlusYears => "3+ years",
    }
}

wire_enum! {
    /// Lifecycle of a listing. Only `Active` listings show up when browsing;
    /// `Deleted` is the soft-delete state and is treated as absent everywhere.
    ListingStatus as "listing status" {
        Active => "active",
        Sold => "sold",
        Deleted => "deleted",
    }
}

/// Maximum number of images a listing may carry.
pub const MAX_IMAGES_PER_LISTING: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
            assert_eq!(category.as_str().parse::<Category>().unwrap(), *category);
        }
        assert_eq!(Location::YverdonLesBains.as_str(), "Yverdon-les-Bains");
        assert_eq!("3+ years".parse::<AgeRange>().unwrap(), AgeRange::ThreePlusYears);
    }

    #[test]
    fn unknown_variant_names_the_kind() {
        let err = "spaceship".parse::<Category>().unwrap_err();
        assert_eq!(err.kind, "category");
        assert_eq!(err.to_string(), "unknown category: 'spaceship'");
        assert!("Active".parse::<ListingStatus>().is_err());
    }
}
