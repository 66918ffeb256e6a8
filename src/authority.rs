//! Static per-authority portal profiles.
//!
//! Every planning authority the pipeline knows about maps to exactly one
//! profile: which detail-page layout its portal renders, where its search
//! form lives, and which selectors drive that form. Authorities without a
//! dedicated entry all share the tab-panel layout of the national
//! ePlanning portals and never take the search path.

/// The three structurally distinct detail-page layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    /// Framework-driven form: fields are named `input`/`textarea` elements.
    FormInput,
    /// Label/value tables spread across click-activated tab panels.
    TabbedPanels,
    /// A single legacy label/value table, different label texts.
    LegacyTable,
}

/// CSS selectors for an authority's search form.
#[derive(Debug, Clone, Copy)]
pub struct SearchSelectors {
    pub input: &'static str,
    pub submit: &'static str,
}

const AGILE_SEARCH: SearchSelectors = SearchSelectors {
    input: "#searchInput",
    submit: "#searchBtn",
};

const EPLANNING_SEARCH: SearchSelectors = SearchSelectors {
    input: "#TxtFileNumber",
    submit: "#SearchButton",
};

/// Read-only portal configuration for one authority.
#[derive(Debug, Clone, Copy)]
pub struct AuthorityProfile {
    pub name: &'static str,
    pub layout: LayoutVariant,
    /// Search form URL, for authorities whose stored detail links are
    /// unusable. `None` means the direct-link path is the only path.
    pub search_url: Option<&'static str>,
    pub search: SearchSelectors,
    /// Column title carrying the application reference in the modern
    /// result-table layout.
    pub reference_column: &'static str,
}

/// A planning authority with a known portal.
///
/// `Other` covers every authority on the shared national ePlanning portals;
/// they are only ever reached through stored detail links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    DunLaoghaireRathdown,
    DublinCity,
    SouthDublin,
    Fingal,
    Wexford,
    Laois,
    Louth,
    Mayo,
    Other,
}

impl Authority {
    pub const ALL: [Authority; 9] = [
        Authority::DunLaoghaireRathdown,
        Authority::DublinCity,
        Authority::SouthDublin,
        Authority::Fingal,
        Authority::Wexford,
        Authority::Laois,
        Authority::Louth,
        Authority::Mayo,
        Authority::Other,
    ];

    /// Resolve a warehouse authority name to its portal profile key.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Dun Laoghaire Rathdown County Council" => Authority::DunLaoghaireRathdown,
            "Dublin City Council" => Authority::DublinCity,
            "South Dublin County Council" => Authority::SouthDublin,
            "Fingal County Council" => Authority::Fingal,
            "Wexford County Council" => Authority::Wexford,
            "Laois County Council" => Authority::Laois,
            "Louth County Council" => Authority::Louth,
            "Mayo County Council" => Authority::Mayo,
            _ => Authority::Other,
        }
    }

    pub fn profile(&self) -> &'static AuthorityProfile {
        match self {
            Authority::DunLaoghaireRathdown => &AuthorityProfile {
                name: "Dun Laoghaire Rathdown County Council",
                layout: LayoutVariant::FormInput,
                search_url: Some(
                    "https://planning.agileapplications.ie/dunlaoghaire/search-applications/",
                ),
                search: AGILE_SEARCH,
                reference_column: "Reference",
            },
            Authority::DublinCity => &AuthorityProfile {
                name: "Dublin City Council",
                layout: LayoutVariant::FormInput,
                search_url: Some(
                    "https://planning.agileapplications.ie/dublincity/search-applications/",
                ),
                search: AGILE_SEARCH,
                reference_column: "Reference",
            },
            Authority::SouthDublin => &AuthorityProfile {
                name: "South Dublin County Council",
                layout: LayoutVariant::FormInput,
                search_url: Some(
                    "https://planning.agileapplications.ie/southdublin/search-applications/",
                ),
                search: AGILE_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Fingal => &AuthorityProfile {
                name: "Fingal County Council",
                layout: LayoutVariant::FormInput,
                search_url: Some(
                    "https://planning.agileapplications.ie/fingal/search-applications/",
                ),
                search: AGILE_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Wexford => &AuthorityProfile {
                name: "Wexford County Council",
                layout: LayoutVariant::LegacyTable,
                search_url: Some(
                    "https://planning.agileapplications.ie/wexford/search-applications/",
                ),
                search: AGILE_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Laois => &AuthorityProfile {
                name: "Laois County Council",
                layout: LayoutVariant::TabbedPanels,
                search_url: Some("https://www.eplanning.ie/LaoisCC/searchexact/"),
                search: EPLANNING_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Louth => &AuthorityProfile {
                name: "Louth County Council",
                layout: LayoutVariant::TabbedPanels,
                search_url: Some("https://www.eplanning.ie/LouthCC/SearchExact/"),
                search: EPLANNING_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Mayo => &AuthorityProfile {
                name: "Mayo County Council",
                layout: LayoutVariant::TabbedPanels,
                search_url: Some("https://www.eplanning.ie/mayocc/SearchExact/"),
                search: EPLANNING_SEARCH,
                reference_column: "Planning Reference",
            },
            Authority::Other => &AuthorityProfile {
                name: "Other",
                layout: LayoutVariant::TabbedPanels,
                search_url: None,
                search: EPLANNING_SEARCH,
                reference_column: "Planning Reference",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_is_total_over_known_authorities() {
        // Every authority resolves to exactly one layout variant; none
        // fall through unmapped.
        for authority in Authority::ALL {
            let profile = authority.profile();
            assert!(matches!(
                profile.layout,
                LayoutVariant::FormInput | LayoutVariant::TabbedPanels | LayoutVariant::LegacyTable
            ));
            assert!(!profile.name.is_empty());
        }
    }

    #[test]
    fn name_resolution_round_trips() {
        for authority in Authority::ALL {
            if authority == Authority::Other {
                continue;
            }
            assert_eq!(Authority::from_name(authority.profile().name), authority);
        }
    }

    #[test]
    fn unknown_authorities_use_the_tabbed_layout() {
        let authority = Authority::from_name("Meath County Council");
        assert_eq!(authority, Authority::Other);
        assert_eq!(authority.profile().layout, LayoutVariant::TabbedPanels);
        assert!(authority.profile().search_url.is_none());
    }

    #[test]
    fn agile_portals_share_form_selectors() {
        for authority in [
            Authority::DunLaoghaireRathdown,
            Authority::DublinCity,
            Authority::SouthDublin,
            Authority::Fingal,
            Authority::Wexford,
        ] {
            assert_eq!(authority.profile().search.input, "#searchInput");
        }
        assert_eq!(Authority::Laois.profile().search.input, "#TxtFileNumber");
    }

    #[test]
    fn dublin_portals_use_the_short_reference_column() {
        assert_eq!(
            Authority::DublinCity.profile().reference_column,
            "Reference"
        );
        assert_eq!(
            Authority::DunLaoghaireRathdown.profile().reference_column,
            "Reference"
        );
        assert_eq!(
            Authority::Fingal.profile().reference_column,
            "Planning Reference"
        );
    }
}
