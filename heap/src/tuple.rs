//! Fixed-width tuple encoding for heap-file relations.
//!
//! Every column occupies a fixed byte span regardless of type, so an index
//! built over this heap can read its key with a plain byte-offset slice
//! instead of parsing the whole record.

/// A column's storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Integer,
    Varchar,
}

/// A column in a relation's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: Type,
    /// Fixed on-disk width in bytes. 4 for `Integer`; the padded/truncated
    /// capacity for `Varchar`.
    pub length: u16,
}

/// A relation's fixed-width layout: an ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// The fixed serialized length of any tuple under this schema.
    pub fn row_len(&self) -> usize {
        self.columns.iter().map(|c| c.length as usize).sum()
    }

    /// The byte offset of `column_index` within a serialized row.
    pub fn byte_offset(&self, column_index: usize) -> usize {
        self.columns[..column_index]
            .iter()
            .map(|c| c.length as usize)
            .sum()
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Varchar(String),
}

/// A decoded row: one value per column of its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    /// Serializes this tuple to its fixed-width wire form per `schema`.
    ///
    /// `Varchar` values are NUL-padded or truncated to `column.length`.
    pub fn serialize(&self, schema: &Schema) -> Vec<u8> {
        let mut out = vec![0u8; schema.row_len()];
        let mut offset = 0;
        for (value, column) in self.values.iter().zip(&schema.columns) {
            let width = column.length as usize;
            match value {
                Value::Integer(v) => {
                    out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
                }
                Value::Varchar(s) => {
                    let bytes = s.as_bytes();
                    let n = bytes.len().min(width);
                    out[offset..offset + n].copy_from_slice(&bytes[..n]);
                }
            }
            offset += width;
        }
        out
    }

    /// Decodes a tuple from its fixed-width wire form per `schema`.
    pub fn deserialize(bytes: &[u8], schema: &Schema) -> Self {
        let mut values = Vec::with_capacity(schema.columns.len());
        let mut offset = 0;
        for column in &schema.columns {
            let width = column.length as usize;
            let field = &bytes[offset..offset + width];
            let value = match column.column_type {
                Type::Integer => Value::Integer(i32::from_le_bytes(field[0..4].try_into().unwrap())),
                Type::Varchar => {
                    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
                    Value::Varchar(String::from_utf8_lossy(&field[..end]).into_owned())
                }
            };
            values.push(value);
            offset += width;
        }
        Tuple { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema {
            columns: vec![
                Column {
                    name: "id".to_string(),
                    column_type: Type::Integer,
                    length: 4,
                },
                Column {
                    name: "name".to_string(),
                    column_type: Type::Varchar,
                    length: 20,
                },
            ],
        }
    }

    #[test]
    fn round_trips_a_tuple() {
        let schema = schema();
        let tuple = Tuple {
            values: vec![Value::Integer(7), Value::Varchar("hello".to_string())],
        };
        let bytes = tuple.serialize(&schema);
        assert_eq!(bytes.len(), schema.row_len());
        assert_eq!(Tuple::deserialize(&bytes, &schema), tuple);
    }

    #[test]
    fn integer_column_sits_at_its_byte_offset() {
        let schema = schema();
        let tuple = Tuple {
            values: vec![Value::Integer(-5), Value::Varchar("x".to_string())],
        };
        let bytes = tuple.serialize(&schema);
        let offset = schema.byte_offset(0);
        let key = i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        assert_eq!(key, -5);
    }
}
