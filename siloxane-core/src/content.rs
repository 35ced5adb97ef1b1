use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::canonical;
use crate::error::Error;

/// Content type stamped on every write.
pub const CONTENT_TYPE: &str = "application/json";

/// Builds the canonical content body of a document.
///
/// Fields are emitted as a JSON object in the order they are written, which
/// for derived documents is declaration order. Nested structs keep their own
/// field order; map entries are sorted by key.
#[derive(Debug, Default)]
pub struct ContentWriter {
    fields: Map<String, Value>,
}

impl ContentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one mapped field under its wire name.
    pub fn field<V: Serialize + ?Sized>(&mut self, wire_name: &str, value: &V) -> Result<(), Error> {
        let value = canonical::to_value(value).map_err(|e| Error::encoding(wire_name, e))?;
        self.fields.insert(wire_name.to_string(), value);
        Ok(())
    }

    /// Serializes the collected fields.
    pub fn finish(self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(&self.fields).map_err(|e| Error::encoding("<content>", e))
    }
}

/// Parsed content body, read field by field.
#[derive(Debug, Default)]
pub struct ContentReader {
    fields: Map<String, Value>,
}

impl ContentReader {
    /// Parses a stored content body. An empty body reads as an empty object.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let fields = serde_json::from_slice(bytes).map_err(|e| Error::encoding("<content>", e))?;
        Ok(ContentReader { fields })
    }

    /// Reads one field. `None` if the body does not carry it.
    pub fn field<V: DeserializeOwned>(&self, wire_name: &str) -> Result<Option<V>, Error> {
        match self.fields.get(wire_name) {
            None => Ok(None),
            Some(value) => V::deserialize(value)
                .map(Some)
                .map_err(|e| Error::encoding(wire_name, e)),
        }
    }

    pub fn contains(&self, wire_name: &str) -> bool {
        self.fields.contains_key(wire_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn preserves_write_order() {
        let mut out = ContentWriter::new();
        out.field("zeta", "z").unwrap();
        out.field("alpha", &1.5).unwrap();
        out.field("mid", &true).unwrap();
        assert_eq!(
            String::from_utf8(out.finish().unwrap()).unwrap(),
            r#"{"zeta":"z","alpha":1.5,"mid":true}"#
        );
    }

    #[test]
    fn equal_maps_encode_identically() {
        let build = |order: &[usize]| {
            let mut flags = HashMap::new();
            for &i in order {
                flags.insert(format!("flag{}", i), i % 2 == 0);
            }
            let mut out = ContentWriter::new();
            out.field("flags", &flags).unwrap();
            out.finish().unwrap()
        };
        let first = build(&[0, 1, 2, 3, 4, 5, 6, 7]);
        for _ in 0..20 {
            assert_eq!(build(&[7, 3, 5, 1, 0, 6, 2, 4]), first);
        }
        assert!(String::from_utf8(first).unwrap().starts_with(r#"{"flags":{"flag0":true,"flag1":false"#));
    }

    #[test]
    fn non_string_map_keys_fail() {
        let mut bad = BTreeMap::new();
        bad.insert((1u8, 2u8), true);
        let mut out = ContentWriter::new();
        let err = out.field("pairs", &bad).unwrap_err();
        assert!(matches!(err, Error::Encoding { ref field, .. } if field == "pairs"));
    }

    #[test]
    fn absent_and_unknown_fields() {
        let reader = ContentReader::parse(br#"{"known":3,"extra":"ignored"}"#).unwrap();
        assert_eq!(reader.field::<i64>("known").unwrap(), Some(3));
        assert_eq!(reader.field::<String>("missing").unwrap(), None);
        assert!(reader.contains("extra"));
    }

    #[test]
    fn type_mismatch_is_encoding_error() {
        let reader = ContentReader::parse(br#"{"n":"not a number"}"#).unwrap();
        assert!(matches!(
            reader.field::<i64>("n"),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn empty_body_reads_empty() {
        let reader = ContentReader::parse(b"").unwrap();
        assert_eq!(reader.field::<bool>("anything").unwrap(), None);
    }

    #[test]
    fn non_object_body_fails() {
        assert!(ContentReader::parse(b"[1,2]").is_err());
    }
}
