//! Subscription tiers and the quota arithmetic that goes with them.
//!
//! Tiers are compiled in and never change at runtime. Any plan identifier that does not name a
//! known tier resolves to [`FREE`], the most restrictive one.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const FREE: SearchTier = SearchTier {
	name: "free",
	max_queries: Allowance::Limited(10),
	max_results: 5,
	capabilities: &[Capability::SummarySearch, Capability::ChapterSearch],
	upgrade_message: "You have used all 10 free searches this month. Upgrade to Basic for 100 \
		searches, full-text matching, and longer result lists.",
};
pub const BASIC: SearchTier = SearchTier {
	name: "basic",
	max_queries: Allowance::Limited(100),
	max_results: 15,
	capabilities: &[
		Capability::SummarySearch,
		Capability::ChapterSearch,
		Capability::FulltextSearch,
	],
	upgrade_message: "You have used all 100 Basic searches this month. Upgrade to Premium for \
		unlimited searches and AI relevance analysis.",
};
pub const PREMIUM: SearchTier = SearchTier {
	name: "premium",
	max_queries: Allowance::Unlimited,
	max_results: 50,
	capabilities: &[
		Capability::SummarySearch,
		Capability::ChapterSearch,
		Capability::FulltextSearch,
		Capability::AiAnalysis,
	],
	upgrade_message: "You are on the highest plan.",
};
pub const TIERS: [&SearchTier; 3] = [&FREE, &BASIC, &PREMIUM];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
	SummarySearch,
	ChapterSearch,
	FulltextSearch,
	AiAnalysis,
}
impl Capability {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::SummarySearch => "summary_search",
			Self::ChapterSearch => "chapter_search",
			Self::FulltextSearch => "fulltext_search",
			Self::AiAnalysis => "ai_analysis",
		}
	}
}
impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A query count that is either bounded or unlimited.
///
/// Serialized as a plain number, or as the string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
	Limited(u32),
	Unlimited,
}
impl Allowance {
	/// True when `used` has already reached a finite allowance.
	pub fn is_exhausted(self, used: u32) -> bool {
		match self {
			Self::Limited(max) => used >= max,
			Self::Unlimited => false,
		}
	}

	/// What is left of this allowance after `used` queries.
	pub fn remaining_after(self, used: u32) -> Allowance {
		match self {
			Self::Limited(max) => Self::Limited(max.saturating_sub(used)),
			Self::Unlimited => Self::Unlimited,
		}
	}
}
impl Serialize for Allowance {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			Self::Limited(count) => serializer.serialize_u32(*count),
			Self::Unlimited => serializer.serialize_str("unlimited"),
		}
	}
}
impl<'de> Deserialize<'de> for Allowance {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Count(u32),
			Label(String),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Count(count) => Ok(Self::Limited(count)),
			Raw::Label(label) if label == "unlimited" => Ok(Self::Unlimited),
			Raw::Label(label) =>
				Err(serde::de::Error::custom(format!("Unknown allowance label {label:?}."))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchTier {
	pub name: &'static str,
	pub max_queries: Allowance,
	/// Cap applied to the ranked result list after all stages and analysis have run.
	pub max_results: usize,
	pub capabilities: &'static [Capability],
	pub upgrade_message: &'static str,
}
impl SearchTier {
	pub fn has(&self, capability: Capability) -> bool {
		self.capabilities.contains(&capability)
	}
}

/// Resolves a plan identifier to its tier. Never fails: unknown plans get [`FREE`].
pub fn resolve_tier(plan: &str) -> &'static SearchTier {
	let plan = plan.trim();

	TIERS.into_iter().find(|tier| tier.name.eq_ignore_ascii_case(plan)).unwrap_or(&FREE)
}
