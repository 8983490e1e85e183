//! IRI vocabulary used across the store, translator, and orchestrator.

/// The type predicate. By convention this is the first entry of the IRI
/// dictionary, so queries referencing it compress to the bare `a` keyword.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

// schema.org terms carried by the application, environment, and rules graphs.
pub const SCHEMA_NAME: &str = "http://schema.org/name";
pub const SCHEMA_IDENTIFIER: &str = "http://schema.org/identifier";
pub const SCHEMA_KEYWORDS: &str = "http://schema.org/keywords";
pub const SCHEMA_TEXT: &str = "http://schema.org/text";
pub const SCHEMA_PROGRAMMING_LANGUAGE: &str = "http://schema.org/programmingLanguage";
pub const SCHEMA_ENCODING_FORMAT: &str = "http://schema.org/encodingFormat";
pub const SCHEMA_HAS_PART: &str = "http://schema.org/hasPart";
pub const SCHEMA_IS_PART_OF: &str = "http://schema.org/isPartOf";
pub const SCHEMA_MEMBER_OF: &str = "http://schema.org/memberOf";
pub const SCHEMA_ADDITIONAL_TYPE: &str = "http://schema.org/additionalType";
pub const SCHEMA_ADDITIONAL_PROPERTY: &str = "http://schema.org/additionalProperty";
pub const SCHEMA_VALUE: &str = "http://schema.org/value";
pub const SCHEMA_POSITION: &str = "http://schema.org/position";
pub const SCHEMA_ITEM: &str = "http://schema.org/item";
pub const SCHEMA_ITEM_LIST_ELEMENT: &str = "http://schema.org/itemListElement";

pub const SCHEMA_PROPERTY_VALUE: &str = "http://schema.org/PropertyValue";
pub const SCHEMA_ITEM_LIST: &str = "http://schema.org/ItemList";
pub const SCHEMA_LIST_ITEM: &str = "http://schema.org/ListItem";
pub const SCHEMA_STRUCTURED_VALUE: &str = "http://schema.org/StructuredValue";
pub const SCHEMA_SOFTWARE_SOURCE_CODE: &str = "http://schema.org/SoftwareSourceCode";

// Application-model classes and relations.
pub const NRUA_APPLICATION: &str = "urn:nrua:Application";
pub const NRUA_FLOW: &str = "urn:nrua:Flow";
pub const NRUA_NODE: &str = "urn:nrua:Node";
pub const NRUA_NODE_OUTPUT: &str = "urn:nrua:NodeOutput";
pub const NRUA_ENVIRONMENT: &str = "urn:nrua:Environment";
pub const NRUA_RULE: &str = "urn:nrua:Rule";
pub const NRUA_WIRED_TO: &str = "urn:nrua:wiredTo";

/// Helper predicates carrying this prefix are emitted during reasoning but
/// never persisted into the inferred graph.
pub const NRUA_PV_PREFIX: &str = "urn:nrua:pv:";
