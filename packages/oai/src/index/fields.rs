//! Index field names used by the engine and the renderers.

/// Persistent identifier; the key of every record.
pub const PI: &str = "PI";

/// Update timestamps in milliseconds (multi-valued, one per reindex).
pub const DATE_UPDATED: &str = "DATEUPDATED";

/// Deletion timestamp in milliseconds; present only on tombstones.
pub const DATE_DELETED: &str = "DATEDELETED";

/// Format of the stored source document (`METS`, `LIDO`, ...).
pub const SOURCE_FORMAT: &str = "SOURCEDOCFORMAT";

/// Document structure type.
pub const DOC_STRUCT: &str = "DOCSTRCT";

pub const TITLE: &str = "MD_TITLE";
pub const CREATOR: &str = "MD_CREATOR";
pub const SUBJECT: &str = "MD_SUBJECT";
pub const DESCRIPTION: &str = "MD_DESCRIPTION";
pub const PUBLISHER: &str = "MD_PUBLISHER";
pub const YEAR_PUBLISHED: &str = "MD_YEARPUBLISH";
pub const LANGUAGE: &str = "MD_LANGUAGE";
pub const RIGHTS: &str = "MD_ACCESSCONDITION";

/// Uniform resource name of the work.
pub const URN: &str = "URN";

/// Languages with a TEI transcription; one OAI record per value.
pub const TEI_LANGUAGES: &str = "TEI_LANG";

/// Languages with a CMDI description; one OAI record per value.
pub const CMDI_LANGUAGES: &str = "CMDI_LANG";
