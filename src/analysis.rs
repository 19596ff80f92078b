use std::sync::Arc;

use crate::config::ServiceMapping;
use crate::model::{PortAnalysis, PortCard};
use crate::resolver::ServiceResolver;
use crate::scanner::{PortSource, list_listening_ports};

pub const MIN_PORT: u16 = 1;
pub const MAX_PORT: u16 = 65535;

/// Inclusive port interval used to narrow an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: MIN_PORT,
            end: MAX_PORT,
        }
    }
}

impl PortRange {
    /// Builds a range from raw query values. Missing values take the
    /// defaults; if either value is not an integer the full range is used.
    /// Values are clamped into the valid port interval and swapped when
    /// given in reverse.
    pub fn from_query(start: Option<&str>, end: Option<&str>) -> Self {
        let parse = |raw: Option<&str>, default: u16| match raw {
            Some(raw) => raw.trim().parse::<i64>().ok(),
            None => Some(i64::from(default)),
        };

        let (Some(start), Some(end)) = (parse(start, MIN_PORT), parse(end, MAX_PORT)) else {
            return Self::default();
        };

        let clamp = |value: i64| value.clamp(i64::from(MIN_PORT), i64::from(MAX_PORT)) as u16;
        let (start, end) = (clamp(start), clamp(end));

        if start > end {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

/// Joins live listening ports with their service labels.
#[derive(Clone)]
pub struct PortAnalyzer {
    source: Arc<dyn PortSource>,
}

impl PortAnalyzer {
    pub fn new(source: Arc<dyn PortSource>) -> Self {
        Self { source }
    }

    pub fn analyze(&self, mapping: &ServiceMapping, range: PortRange) -> PortAnalysis {
        let resolver = ServiceResolver::new(mapping);

        // BTreeMap iteration is already ascending by port
        let port_cards: Vec<PortCard> = list_listening_ports(self.source.as_ref())
            .into_iter()
            .filter(|(port, _)| range.contains(*port))
            .map(|(port, owner)| PortCard::new(port, resolver.resolve(port).to_string(), owner))
            .collect();

        let used = port_cards.len();
        PortAnalysis {
            port_cards,
            total_used: used,
            tcp_used: used,
            udp_used: 0,
        }
    }
}

impl PortAnalysis {
    /// Keeps cards whose port, process, service name or pid contains
    /// `query`, ignoring case. `total_used` follows the filtered list while
    /// `tcp_used` keeps the unfiltered count.
    pub fn retain_matching(&mut self, query: &str) {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return;
        }

        self.port_cards
            .retain(|card| card.searchable_text().contains(&needle));
        self.total_used = self.port_cards.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::testing::FakePortSource;

    fn analyzer(entries: &[(u16, Option<u32>, &str)]) -> PortAnalyzer {
        PortAnalyzer::new(Arc::new(FakePortSource::with(entries)))
    }

    fn mapping(entries: &[(&str, u16)]) -> ServiceMapping {
        entries
            .iter()
            .map(|(name, port)| (name.to_string(), *port))
            .collect()
    }

    #[test]
    fn range_defaults_to_full_interval() {
        assert_eq!(PortRange::from_query(None, None), PortRange::default());
        assert_eq!(
            PortRange::from_query(Some("1"), Some("65535")),
            PortRange { start: 1, end: 65535 }
        );
    }

    #[test]
    fn range_swaps_reversed_bounds() {
        assert_eq!(
            PortRange::from_query(Some("100"), Some("50")),
            PortRange { start: 50, end: 100 }
        );
    }

    #[test]
    fn range_falls_back_on_non_integer() {
        assert_eq!(PortRange::from_query(Some("abc"), None), PortRange::default());
        assert_eq!(
            PortRange::from_query(Some("10"), Some("2.5")),
            PortRange::default()
        );
    }

    #[test]
    fn range_clamps_out_of_bounds() {
        assert_eq!(
            PortRange::from_query(Some("-5"), Some("99999")),
            PortRange { start: 1, end: 65535 }
        );
        assert_eq!(
            PortRange::from_query(Some("70000"), Some("0")),
            PortRange { start: 1, end: 65535 }
        );
        assert_eq!(
            PortRange::from_query(Some(" 8000 "), None),
            PortRange {
                start: 8000,
                end: 65535
            }
        );
    }

    #[test]
    fn analysis_joins_names_and_sorts() {
        let analyzer = analyzer(&[(80, Some(300), "nginx"), (22, Some(1), "sshd")]);
        let config = mapping(&[("HTTP", 80), ("Custom", 9999)]);

        let analysis = analyzer.analyze(&config, PortRange::default());

        assert_eq!(analysis.total_used, 2);
        assert_eq!(analysis.tcp_used, 2);
        assert_eq!(analysis.udp_used, 0);
        assert_eq!(analysis.port_cards[0].port, 22);
        assert_eq!(analysis.port_cards[0].service_name, "SSH");
        assert_eq!(analysis.port_cards[0].process, "sshd");
        assert_eq!(analysis.port_cards[1].port, 80);
        assert_eq!(analysis.port_cards[1].service_name, "HTTP");
    }

    #[test]
    fn analysis_filters_inclusive_range() {
        let analyzer = analyzer(&[
            (49, None, ""),
            (50, None, ""),
            (100, None, ""),
            (101, None, ""),
        ]);

        let analysis = analyzer.analyze(
            &ServiceMapping::new(),
            PortRange::from_query(Some("100"), Some("50")),
        );

        let ports: Vec<u16> = analysis.port_cards.iter().map(|card| card.port).collect();
        assert_eq!(ports, vec![50, 100]);
        assert_eq!(analysis.total_used, 2);
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let analyzer = analyzer(&[
            (80, Some(300), "nginx"),
            (22, Some(1), "sshd"),
            (5432, Some(8080), "postgres"),
        ]);
        let config = mapping(&[("HTTP", 80)]);

        let mut by_port = analyzer.analyze(&config, PortRange::default());
        by_port.retain_matching("80");
        let ports: Vec<u16> = by_port.port_cards.iter().map(|card| card.port).collect();
        assert_eq!(ports, vec![80, 5432]);

        let mut by_name = analyzer.analyze(&config, PortRange::default());
        by_name.retain_matching("  PostgreSQL ");
        assert_eq!(by_name.port_cards.len(), 1);
        assert_eq!(by_name.total_used, 1);
        assert_eq!(by_name.tcp_used, 3);
    }

    #[test]
    fn missing_pid_is_searchable_as_none() {
        let analyzer = analyzer(&[(80, Some(300), "nginx"), (9999, None, "")]);

        let mut analysis = analyzer.analyze(&ServiceMapping::new(), PortRange::default());
        analysis.retain_matching("None");

        let ports: Vec<u16> = analysis.port_cards.iter().map(|card| card.port).collect();
        assert_eq!(ports, vec![9999]);
        assert_eq!(analysis.port_cards[0].ref_array()[4], "");
    }

    #[test]
    fn empty_search_keeps_everything() {
        let analyzer = analyzer(&[(80, None, ""), (22, None, "")]);

        let mut analysis = analyzer.analyze(&ServiceMapping::new(), PortRange::default());
        analysis.retain_matching("   ");

        assert_eq!(analysis.port_cards.len(), 2);
    }
}
