//! Constants shared by the parameters model and the wire format.

/// Separator between levels of a hierarchical facet path.
pub const DEFAULT_HIERARCHICAL_SEPARATOR: &str = " > ";

/// Attribute name under which tag refinements are stored.
pub const TAGS_ATTRIBUTE: &str = "_tags";

pub const DEFAULT_SEARCH_BACKEND_URL: &str = "http://127.0.0.1:9308";

pub const SEARCH_BACKEND_URL_ENV: &str = "SEARCH_BACKEND_URL";
