use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A searchable book record.
///
/// Every field is optional; unset fields serialize as `null` so the
/// document always carries exactly `author`, `name` and `publicationDate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Who wrote the book
    #[serde(default)]
    author: Option<String>,
    /// Title of the book
    #[serde(default)]
    name: Option<String>,
    /// Calendar date of first publication
    #[serde(default, with = "publication_date")]
    publication_date: Option<NaiveDate>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn set_author(&mut self, author: Option<String>) {
        self.author = author;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn publication_date(&self) -> Option<NaiveDate> {
        self.publication_date
    }

    pub fn set_publication_date(&mut self, publication_date: Option<NaiveDate>) {
        self.publication_date = publication_date;
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_publication_date(mut self, publication_date: NaiveDate) -> Self {
        self.publication_date = Some(publication_date);
        self
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Book{author=")?;
        write_quoted(f, self.author.as_deref())?;
        f.write_str(", name=")?;
        write_quoted(f, self.name.as_deref())?;
        match self.publication_date {
            Some(date) => write!(f, ", publicationDate={}}}", date),
            None => f.write_str(", publicationDate=null}"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: Option<&str>) -> fmt::Result {
    match value {
        Some(value) => write!(f, "'{}'", value),
        None => f.write_str("null"),
    }
}

/// `publicationDate` is written as `YYYY-MM-DD`.
///
/// Reading also accepts RFC 3339 timestamps and epoch milliseconds (a
/// fractional part is truncated); both keep their UTC calendar date.
mod publication_date {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            FractionalMillis(f64),
            Text(String),
        }

        let millis = match Option::<Raw>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(Raw::Millis(millis)) => millis,
            Some(Raw::FractionalMillis(millis)) if millis.is_finite() => millis.trunc() as i64,
            Some(Raw::FractionalMillis(millis)) => {
                return Err(D::Error::custom(format!("timestamp {} is out of range", millis)))
            }
            Some(Raw::Text(text)) => return parse_text(&text).map(Some).map_err(D::Error::custom),
        };

        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|instant| Some(instant.date_naive()))
            .ok_or_else(|| D::Error::custom(format!("timestamp {} is out of range", millis)))
    }

    fn parse_text(text: &str) -> Result<NaiveDate, String> {
        if let Ok(date) = NaiveDate::parse_from_str(text, FORMAT) {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(text)
            .map(|instant| instant.with_timezone(&Utc).date_naive())
            .map_err(|_| format!("invalid publication date '{}'", text))
    }
}
