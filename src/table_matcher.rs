//! C2 — Table Matcher.
//!
//! Resolves a logical table name to the ordered list of physical table
//! names that actually exist in the routing table.

use crate::providers::RoutingProvider;

pub const OFFLINE_SUFFIX: &str = "_OFFLINE";
pub const REALTIME_SUFFIX: &str = "_REALTIME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedTables {
    /// Neither suffix nor the raw name exists — yields a `NoTableHit`
    /// response, not an error.
    None,
    Offline(String),
    Realtime(String),
    Hybrid { offline: String, realtime: String },
    /// Raw logical name exists as a physical table on its own.
    Raw(String),
}

impl MatchedTables {
    pub fn is_empty(&self) -> bool {
        matches!(self, MatchedTables::None)
    }

    pub fn physical_names(&self) -> Vec<String> {
        match self {
            MatchedTables::None => vec![],
            MatchedTables::Offline(t) | MatchedTables::Realtime(t) | MatchedTables::Raw(t) => {
                vec![t.clone()]
            }
            MatchedTables::Hybrid { offline, realtime } => {
                vec![offline.clone(), realtime.clone()]
            }
        }
    }
}

/// Output: ordered list of physical names from `{T_OFFLINE, T_REALTIME}`
/// that exist in the routing table; if neither exists, fall back to raw
/// `T` if it exists; otherwise empty.
pub async fn match_table(logical: &str, routing: &dyn RoutingProvider) -> MatchedTables {
    let offline_name = format!("{logical}{OFFLINE_SUFFIX}");
    let realtime_name = format!("{logical}{REALTIME_SUFFIX}");

    let has_offline = routing.exists(&offline_name).await;
    let has_realtime = routing.exists(&realtime_name).await;

    match (has_offline, has_realtime) {
        (true, true) => MatchedTables::Hybrid {
            offline: offline_name,
            realtime: realtime_name,
        },
        (true, false) => MatchedTables::Offline(offline_name),
        (false, true) => MatchedTables::Realtime(realtime_name),
        (false, false) => {
            if routing.exists(logical).await {
                MatchedTables::Raw(logical.to_string())
            } else {
                MatchedTables::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticRoutingProvider;

    #[tokio::test]
    async fn hybrid_when_both_suffixes_present() {
        let routing = StaticRoutingProvider::new();
        routing.register_table("t_OFFLINE");
        routing.register_table("t_REALTIME");
        assert_eq!(
            match_table("t", &routing).await,
            MatchedTables::Hybrid {
                offline: "t_OFFLINE".to_string(),
                realtime: "t_REALTIME".to_string()
            }
        );
    }

    #[tokio::test]
    async fn offline_only() {
        let routing = StaticRoutingProvider::new();
        routing.register_table("t_OFFLINE");
        assert_eq!(
            match_table("t", &routing).await,
            MatchedTables::Offline("t_OFFLINE".to_string())
        );
    }

    #[tokio::test]
    async fn falls_back_to_raw_name() {
        let routing = StaticRoutingProvider::new();
        routing.register_table("t");
        assert_eq!(
            match_table("t", &routing).await,
            MatchedTables::Raw("t".to_string())
        );
    }

    #[tokio::test]
    async fn no_match_yields_none() {
        let routing = StaticRoutingProvider::new();
        assert_eq!(match_table("missing", &routing).await, MatchedTables::None);
        assert!(MatchedTables::None.is_empty());
    }
}
