//! The parsed search query model.
//!
//! These types are the contract between the URL parser (out of scope for
//! this crate) and the query compiler. A [`Query`] holds a list of
//! [`SearchParam`] values - a closed sum over the FHIR parameter kinds, so
//! the compiler's dispatch is exhaustive - plus the result-shaping
//! [`QueryOptions`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{FhirDateTime, FhirNumber};

/// Comparison prefixes for ordered search parameters.
///
/// See: https://www.hl7.org/fhir/search.html#prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Prefix {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Starts after.
    Sa,
    /// Ends before.
    Eb,
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Prefix::Eq => "eq",
            Prefix::Ne => "ne",
            Prefix::Gt => "gt",
            Prefix::Lt => "lt",
            Prefix::Ge => "ge",
            Prefix::Le => "le",
            Prefix::Sa => "sa",
            Prefix::Eb => "eb",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Prefix::Eq),
            "ne" => Ok(Prefix::Ne),
            "gt" => Ok(Prefix::Gt),
            "lt" => Ok(Prefix::Lt),
            "ge" => Ok(Prefix::Ge),
            "le" => Ok(Prefix::Le),
            "sa" => Ok(Prefix::Sa),
            "eb" => Ok(Prefix::Eb),
            _ => Err(format!("unknown search prefix: {s}")),
        }
    }
}

/// One element path a search parameter indexes, with the FHIR datatype at
/// that path (e.g. `"Period"`, `"CodeableConcept"`, `"HumanName"`).
///
/// Paths use the dictionary grammar: `[]` marks a collection element,
/// `[N]` an indexed element, e.g. `"[]name.family"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParamPath {
    /// The element path.
    pub path: String,
    /// The FHIR datatype found at the path.
    pub fhir_type: String,
}

impl SearchParamPath {
    /// Creates a path entry.
    pub fn new(path: impl Into<String>, fhir_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fhir_type: fhir_type.into(),
        }
    }
}

/// Metadata describing a search parameter, as registered in the server's
/// search-parameter dictionary.
///
/// Dictionary entries are shared across requests and must never be mutated
/// by the compiler; pipeline path rewriting clones first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParamInfo {
    /// The resource type this parameter is defined on.
    pub resource: String,
    /// The parameter name as it appears in the query string.
    pub name: String,
    /// The element path(s) the parameter indexes.
    pub paths: Vec<SearchParamPath>,
    /// Target resource types, for reference parameters.
    pub targets: Vec<String>,
    /// The comparison prefix, if the value carried one.
    pub prefix: Option<Prefix>,
    /// The modifier suffix, if the parameter carried one.
    pub modifier: Option<String>,
}

impl SearchParamInfo {
    /// Creates an info with the given owning resource and name; paths and
    /// targets are filled in by the dictionary.
    pub fn new(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            name: name.into(),
            paths: Vec::new(),
            targets: Vec::new(),
            prefix: None,
            modifier: None,
        }
    }

    /// Adds an element path.
    pub fn with_path(mut self, path: impl Into<String>, fhir_type: impl Into<String>) -> Self {
        self.paths.push(SearchParamPath::new(path, fhir_type));
        self
    }

    /// Sets the target resource types.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the comparison prefix.
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Sets the modifier.
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// The effective prefix: `eq` when the value carried none.
    pub fn effective_prefix(&self) -> Prefix {
        self.prefix.unwrap_or_default()
    }

    /// True if the parameter may target any resource type.
    pub fn targets_any(&self) -> bool {
        self.targets.iter().any(|t| t == "Any")
    }
}

/// A parsed search parameter: a closed sum over the FHIR parameter kinds.
#[derive(Debug, Clone)]
pub enum SearchParam {
    /// A composite parameter (not supported by the compiler).
    Composite(CompositeParam),
    /// A date/dateTime/Period/Timing parameter.
    Date(DateParam),
    /// A numeric parameter.
    Number(NumberParam),
    /// A quantity parameter (value with system and code).
    Quantity(QuantityParam),
    /// A reference parameter.
    Reference(ReferenceParam),
    /// A string parameter.
    String(StringParam),
    /// A token parameter (system|code).
    Token(TokenParam),
    /// A URI parameter.
    Uri(UriParam),
    /// A disjunction of parameters (comma-separated values).
    Or(OrParam),
}

impl SearchParam {
    /// The parameter's shared metadata.
    pub fn info(&self) -> &SearchParamInfo {
        match self {
            SearchParam::Composite(p) => &p.info,
            SearchParam::Date(p) => &p.info,
            SearchParam::Number(p) => &p.info,
            SearchParam::Quantity(p) => &p.info,
            SearchParam::Reference(p) => &p.info,
            SearchParam::String(p) => &p.info,
            SearchParam::Token(p) => &p.info,
            SearchParam::Uri(p) => &p.info,
            SearchParam::Or(p) => &p.info,
        }
    }

    /// Mutable access to the metadata. Callers rewriting paths must be
    /// operating on a clone, never on a dictionary entry.
    pub fn info_mut(&mut self) -> &mut SearchParamInfo {
        match self {
            SearchParam::Composite(p) => &mut p.info,
            SearchParam::Date(p) => &mut p.info,
            SearchParam::Number(p) => &mut p.info,
            SearchParam::Quantity(p) => &mut p.info,
            SearchParam::Reference(p) => &mut p.info,
            SearchParam::String(p) => &mut p.info,
            SearchParam::Token(p) => &mut p.info,
            SearchParam::Uri(p) => &mut p.info,
            SearchParam::Or(p) => &mut p.info,
        }
    }

    /// True if this parameter carries a chained sub-query
    /// (e.g. `subject.name=Smith`). Chained parameters are compiled in
    /// pipeline mode only.
    pub fn uses_chained_search(&self) -> bool {
        match self {
            SearchParam::Reference(r) => matches!(r.reference, Reference::Chained { .. }),
            SearchParam::Or(o) => o
                .items
                .first()
                .is_some_and(SearchParam::uses_chained_search),
            _ => false,
        }
    }

    /// True if this parameter carries a reverse-chained (`_has`) sub-query.
    pub fn uses_reverse_chained_search(&self) -> bool {
        match self {
            SearchParam::Reference(r) => {
                matches!(r.reference, Reference::ReverseChained { .. })
            }
            SearchParam::Or(o) => o
                .items
                .first()
                .is_some_and(SearchParam::uses_reverse_chained_search),
            _ => false,
        }
    }
}

/// A date search parameter.
#[derive(Debug, Clone)]
pub struct DateParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The parsed date value with its precision window.
    pub date: FhirDateTime,
}

/// A number search parameter.
#[derive(Debug, Clone)]
pub struct NumberParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The parsed number with its implicit range.
    pub number: FhirNumber,
}

/// A quantity search parameter: a number with units.
#[derive(Debug, Clone)]
pub struct QuantityParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The parsed number with its implicit range.
    pub number: FhirNumber,
    /// The code system, when the search supplied one (`value|system|code`).
    pub system: Option<String>,
    /// The unit code.
    pub code: String,
}

/// A reference search parameter.
#[derive(Debug, Clone)]
pub struct ReferenceParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The reference value.
    pub reference: Reference,
}

/// The value of a reference parameter.
#[derive(Debug, Clone)]
pub enum Reference {
    /// A reference to a resource on this server: `[Type/]id`.
    Local {
        /// The target resource type, when the search named one.
        resource_type: Option<String>,
        /// The target resource id.
        id: String,
    },
    /// An absolute URL reference to an external resource.
    External {
        /// The reference URL.
        url: String,
    },
    /// A chained search (`param.sub=value`): filter by properties of the
    /// referenced resource. Never compiled by the single-document path.
    Chained {
        /// The referenced resource type.
        resource_type: String,
        /// The sub-query evaluated against the referenced resource.
        query: Box<Query>,
    },
    /// A reverse-chained search (`_has`): filter by properties of
    /// resources referencing this one. Never compiled by the
    /// single-document path.
    ReverseChained {
        /// The referring resource type.
        resource_type: String,
        /// The sub-query evaluated against the referring resource.
        query: Box<Query>,
    },
}

/// A string search parameter.
#[derive(Debug, Clone)]
pub struct StringParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The search text.
    pub value: String,
}

/// A token search parameter, parsed from `[system]|[code]` syntax.
///
/// The `(system, code, any_system)` triple distinguishes the four forms:
/// `code` (any system), `system|code`, `system|` (code is `None`), and
/// `|code` (system is `None`, `any_system` false - system must be absent).
#[derive(Debug, Clone)]
pub struct TokenParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The code system.
    pub system: Option<String>,
    /// The code.
    pub code: Option<String>,
    /// True when the search named no system and any system matches.
    pub any_system: bool,
}

/// A URI search parameter.
#[derive(Debug, Clone)]
pub struct UriParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The URI to match exactly.
    pub uri: String,
}

/// A disjunction over parameters, from comma-separated values.
#[derive(Debug, Clone)]
pub struct OrParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The alternatives. All share the same parameter metadata.
    pub items: Vec<SearchParam>,
}

/// A composite search parameter. Carried through the model so the compiler
/// can reject it with a structured error.
#[derive(Debug, Clone)]
pub struct CompositeParam {
    /// Shared metadata.
    pub info: SearchParamInfo,
    /// The raw component values.
    pub components: Vec<String>,
}

/// Result modifiers attached to a query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Page size (`_count`).
    pub count: u32,
    /// Number of results to skip (`_offset`).
    pub offset: u32,
    /// Sort keys in priority order (`_sort`).
    pub sort: Vec<SortOption>,
    /// Summary mode (`_summary`).
    pub summary: Option<SummaryMode>,
    /// Forward includes (`_include`).
    pub include: Vec<IncludeOption>,
    /// Reverse includes (`_revinclude`).
    pub rev_include: Vec<IncludeOption>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            count: 100,
            offset: 0,
            sort: Vec::new(),
            summary: None,
            include: Vec::new(),
            rev_include: Vec::new(),
        }
    }
}

/// One `_sort` key.
#[derive(Debug, Clone)]
pub struct SortOption {
    /// Sort descending (the `-` prefix).
    pub descending: bool,
    /// The parameter to sort by.
    pub parameter: SearchParamInfo,
}

/// One `_include` or `_revinclude` directive.
#[derive(Debug, Clone)]
pub struct IncludeOption {
    /// The reference parameter to join on. For reverse includes this is a
    /// parameter of the referring resource (`parameter.resource`).
    pub parameter: SearchParamInfo,
}

/// Mode for the `_summary` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Return summary elements only.
    True,
    /// Return the full resource.
    False,
    /// Return narrative only.
    Text,
    /// Return data elements only.
    Data,
    /// Return the count only; the executor skips result collection.
    Count,
}

/// A complete parsed search query.
#[derive(Debug, Clone)]
pub struct Query {
    /// The resource type being searched.
    pub resource: String,
    /// The original raw query string, kept solely for count-cache
    /// fingerprinting.
    pub raw_query: String,
    /// The parsed search parameters.
    pub params: Vec<SearchParam>,
    /// Result modifiers.
    pub options: QueryOptions,
}

impl Query {
    /// Creates an empty query for the given resource type.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            raw_query: String::new(),
            params: Vec::new(),
            options: QueryOptions::default(),
        }
    }

    /// Sets the raw query string used for count-cache fingerprinting.
    pub fn with_raw_query(mut self, raw: impl Into<String>) -> Self {
        self.raw_query = raw.into();
        self
    }

    /// Adds a search parameter.
    pub fn with_param(mut self, param: SearchParam) -> Self {
        self.params.push(param);
        self
    }

    /// Replaces the result options.
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// True if the query must be compiled to an aggregation pipeline:
    /// it uses chained or reverse-chained parameters, or the options carry
    /// includes or reverse includes.
    pub fn uses_pipeline(&self) -> bool {
        !self.options.include.is_empty()
            || !self.options.rev_include.is_empty()
            || self
                .params
                .iter()
                .any(|p| p.uses_chained_search() || p.uses_reverse_chained_search())
    }
}
