//----------------------------
// Detection methods
//----------------------------

/// The closed set of detection methods feeding the consensus pipeline.
///
/// Each method carries its class as data:
/// * extending methods contribute to interval merging;
/// * the non-extending CRISPR matcher stands alone and can only
///   corroborate an existing span;
/// * among extending methods, the comparative-genomics detector is
///   the single primary one.
///
/// ```
/// use mgec::libs::method::Method;
/// assert_eq!(Method::parse("virsorter"), Some(Method::VirSorter));
/// assert!(Method::Agent.is_primary());
/// assert!(!Method::Crispr.is_extending());
/// assert_eq!(Method::Reblast.to_string(), "reblast");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// Comparative-genomics detector
    Agent,
    /// Sequence-composition virus detector
    VirSorter,
    /// Known-type similarity detector
    Blaster,
    /// CRISPR protospacer matcher
    Crispr,
    /// Synthesized by the reconciliation pass
    Reblast,
}

impl Method {
    pub fn parse(tag: &str) -> Option<Method> {
        match tag {
            "agent" => Some(Method::Agent),
            "virsorter" => Some(Method::VirSorter),
            "blaster" => Some(Method::Blaster),
            "crispr" => Some(Method::Crispr),
            "reblast" => Some(Method::Reblast),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Agent => "agent",
            Method::VirSorter => "virsorter",
            Method::Blaster => "blaster",
            Method::Crispr => "crispr",
            Method::Reblast => "reblast",
        }
    }

    /// Does this method's output participate in interval merging?
    pub fn is_extending(&self) -> bool {
        !matches!(self, Method::Crispr)
    }

    /// Primary extending methods outrank secondary ones when a span
    /// has a single contributor.
    pub fn is_primary(&self) -> bool {
        matches!(self, Method::Agent)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a comma-joined method list, dropping unknown tags.
///
/// ```
/// use mgec::libs::method::{parse_methods, Method};
/// assert_eq!(
///     parse_methods("agent,virsorter"),
///     vec![Method::Agent, Method::VirSorter]
/// );
/// assert_eq!(parse_methods("agent,bogus"), vec![Method::Agent]);
/// ```
pub fn parse_methods(field: &str) -> Vec<Method> {
    field.split(',').filter_map(Method::parse).collect()
}

/// Comma-join a method list for the TSV surfaces.
pub fn join_methods(methods: &[Method]) -> String {
    use itertools::Itertools;
    methods.iter().map(|m| m.as_str()).join(",")
}
