//! Protocol request model and argument parsing.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::date::Granularity;
use crate::error::{OaiError, Result};

/// OAI-PMH verbs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum Verb {
    Identify,
    ListMetadataFormats,
    ListSets,
    ListIdentifiers,
    ListRecords,
    GetRecord,
}

impl Verb {
    /// Arguments that may accompany this verb (besides `verb` itself).
    #[must_use]
    pub fn legal_arguments(self) -> &'static [&'static str] {
        match self {
            Self::Identify => &[],
            Self::ListMetadataFormats => &["identifier"],
            Self::ListSets => &["resumptionToken"],
            Self::ListIdentifiers | Self::ListRecords => {
                &["metadataPrefix", "from", "until", "set", "resumptionToken"]
            }
            Self::GetRecord => &["identifier", "metadataPrefix"],
        }
    }

    /// Whether the verb produces a paginated list.
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self, Self::ListIdentifiers | Self::ListRecords)
    }
}

/// Metadata formats known to the repository.
///
/// Whether a format is actually served depends on configuration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum MetadataPrefix {
    #[strum(serialize = "oai_dc")]
    #[serde(rename = "oai_dc")]
    OaiDc,
    #[strum(serialize = "ese")]
    #[serde(rename = "ese")]
    Ese,
    #[strum(serialize = "mets")]
    #[serde(rename = "mets")]
    Mets,
    #[strum(serialize = "marcxml")]
    #[serde(rename = "marcxml")]
    Marcxml,
    #[strum(serialize = "lido")]
    #[serde(rename = "lido")]
    Lido,
    #[strum(serialize = "epicur")]
    #[serde(rename = "epicur")]
    Epicur,
    #[strum(serialize = "tei")]
    #[serde(rename = "tei")]
    Tei,
    #[strum(serialize = "cmdi")]
    #[serde(rename = "cmdi")]
    Cmdi,
}

/// An immutable, parsed protocol request.
///
/// The same value is persisted inside resumption tokens (without the token
/// itself) so a follow-up request can replay the original query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OaiRequest {
    pub verb: Verb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_prefix: Option<MetadataPrefix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumption_token: Option<String>,
}

impl OaiRequest {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            metadata_prefix: None,
            identifier: None,
            from: None,
            until: None,
            set: None,
            resumption_token: None,
        }
    }

    pub fn with_metadata_prefix(mut self, prefix: MetadataPrefix) -> Self {
        self.metadata_prefix = Some(prefix);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_resumption_token(mut self, token: impl Into<String>) -> Self {
        self.resumption_token = Some(token.into());
        self
    }

    /// Parse a request from raw query or form pairs.
    ///
    /// # Examples
    /// ```
    /// use oai_harvest::request::{MetadataPrefix, OaiRequest, Verb};
    ///
    /// let request = OaiRequest::from_params([
    ///     ("verb", "ListRecords"),
    ///     ("metadataPrefix", "oai_dc"),
    /// ])
    /// .unwrap();
    /// assert_eq!(request.verb, Verb::ListRecords);
    /// assert_eq!(request.metadata_prefix, Some(MetadataPrefix::OaiDc));
    ///
    /// assert!(OaiRequest::from_params([("verb", "Harvest")]).is_err());
    /// ```
    pub fn from_params<I, K, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut args: BTreeMap<String, String> = BTreeMap::new();
        let mut repeated: Option<String> = None;

        for (key, value) in params {
            let key = key.as_ref().to_string();
            if args.contains_key(&key) {
                repeated.get_or_insert(key);
                continue;
            }
            args.insert(key, value.as_ref().to_string());
        }

        let verb = match args.remove("verb") {
            None => return Err(OaiError::BadVerb("Missing verb argument".to_string())),
            Some(raw) => Verb::from_str(&raw)
                .map_err(|_| OaiError::BadVerb(format!("Illegal verb: '{raw}'")))?,
        };

        if let Some(key) = repeated {
            return Err(OaiError::BadArgument(format!("Repeated argument: '{key}'")));
        }

        let legal = verb.legal_arguments();
        if let Some(key) = args.keys().find(|k| !legal.contains(&k.as_str())) {
            return Err(OaiError::BadArgument(format!(
                "Illegal argument for {verb}: '{key}'"
            )));
        }

        if args.contains_key("resumptionToken") && args.len() > 1 {
            return Err(OaiError::BadArgument(
                "resumptionToken is an exclusive argument".to_string(),
            ));
        }

        let mut request = Self::new(verb);
        request.identifier = args.remove("identifier");
        request.from = args.remove("from");
        request.until = args.remove("until");
        request.set = args.remove("set");
        request.resumption_token = args.remove("resumptionToken");
        request.metadata_prefix = args
            .remove("metadataPrefix")
            .map(|raw| MetadataPrefix::from_str(&raw).map_err(|_| OaiError::CannotDisseminateFormat))
            .transpose()?;

        request.check_required()?;
        Ok(request)
    }

    fn check_required(&self) -> Result<()> {
        match self.verb {
            Verb::ListIdentifiers | Verb::ListRecords if self.resumption_token.is_none() => {
                if self.metadata_prefix.is_none() {
                    return Err(OaiError::BadArgument(
                        "Missing required argument: metadataPrefix".to_string(),
                    ));
                }
            }
            Verb::GetRecord => {
                if self.identifier.is_none() {
                    return Err(OaiError::BadArgument(
                        "Missing required argument: identifier".to_string(),
                    ));
                }
                if self.metadata_prefix.is_none() {
                    return Err(OaiError::BadArgument(
                        "Missing required argument: metadataPrefix".to_string(),
                    ));
                }
            }
            _ => {}
        }

        if let (Some(from), Some(until)) = (&self.from, &self.until) {
            if Granularity::of(from) != Granularity::of(until) {
                return Err(OaiError::BadArgument(
                    "The 'from' and 'until' arguments have different granularities".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Argument pairs to echo in the response `<request>` element.
    #[must_use]
    pub fn echo_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![("verb", self.verb.to_string())];
        let optional = [
            ("identifier", self.identifier.clone()),
            ("metadataPrefix", self.metadata_prefix.map(|p| p.to_string())),
            ("from", self.from.clone()),
            ("until", self.until.clone()),
            ("set", self.set.clone()),
            ("resumptionToken", self.resumption_token.clone()),
        ];
        attrs.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        attrs
    }
}
