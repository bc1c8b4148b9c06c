//! Table descriptors.
//!
//! A [`Table`] is an ordered set of [`Field`]s plus its [`Index`]es. Tables are
//! only constructed through [`TableBuilder`] (or deserialized, which goes through
//! the builder), so every `Table` in the process satisfies these invariants:
//!
//! - field positions form the dense sequence `1..=N` in column order
//! - primary-key ordinals form the dense sequence `1..=K`
//! - at most one index has `primary = true`, and its fields are exactly the
//!   primary-key fields in ordinal order
//! - `primary = true` implies `unique = true`
//! - every index field names an existing field
//!
//! The mutators used to keep a cached descriptor in sync with applied DDL
//! preserve the same invariants.

use crate::types::FieldType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Schema violations and schema file errors.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Field '{field}' not found in table '{table}'")]
    FieldNotFound { table: String, field: String },

    #[error("Field '{field}' already exists in table '{table}'")]
    DuplicateField { table: String, field: String },

    #[error("Table '{table}' has more than one primary index")]
    MultiplePrimaryIndexes { table: String },

    #[error(
        "Primary index of table '{table}' covers {index:?} but the primary key is {primary_key:?}"
    )]
    PrimaryIndexMismatch {
        table: String,
        index: Vec<String>,
        primary_key: Vec<String>,
    },

    #[error("Primary index of table '{table}' is not unique")]
    PrimaryIndexNotUnique { table: String },

    #[error("Index {index} of table '{table}' refers to unknown field '{field}'")]
    IndexFieldNotFound {
        table: String,
        index: String,
        field: String,
    },

    #[error("Index {index} of table '{table}' has no fields")]
    EmptyIndex { table: String, index: String },

    #[error("Field positions of table '{table}' are not dense")]
    NonDensePositions { table: String },

    #[error("Primary key of table '{table}' cannot be changed through field '{field}'")]
    PrimaryKeyChange { table: String, field: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;

// ============================================================================
// Field
// ============================================================================

fn default_true() -> bool {
    true
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    /// Declared logical type
    #[serde(rename = "type")]
    pub data_type: FieldType,

    /// 1-based column position, assigned by the table
    #[serde(default)]
    pub pos: usize,

    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub primary_key: bool,

    /// 1-based ordinal within the primary key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_pos: Option<usize>,

    /// Default expression, passed to the destination verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Field {
    /// Create a nullable, non-key field.
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            pos: 0,
            nullable: true,
            primary_key: false,
            primary_key_pos: None,
            default_value: None,
            comment: None,
        }
    }

    /// Create a primary-key field. Key fields are never nullable.
    pub fn key(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            nullable: false,
            primary_key: true,
            ..Self::new(name, data_type)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

// ============================================================================
// Index
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub name: String,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

impl IndexField {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ascending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<IndexField>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    /// The primary index over `fields`, all ascending.
    pub fn primary<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: None,
            fields: fields.into_iter().map(IndexField::asc).collect(),
            primary: true,
            unique: true,
        }
    }

    pub fn unique<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            fields: fields.into_iter().map(IndexField::asc).collect(),
            primary: false,
            unique: true,
        }
    }

    /// A plain, non-unique index. Destinations with sorted storage use the
    /// first such index as the sorting key.
    pub fn secondary<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            fields: fields.into_iter().map(IndexField::asc).collect(),
            primary: false,
            unique: false,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn label(&self) -> String {
        match (&self.name, self.primary) {
            (Some(name), _) => format!("'{name}'"),
            (None, true) => "PRIMARY".to_string(),
            (None, false) => "<unnamed>".to_string(),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// A validated table descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableDef", into = "TableDef")]
pub struct Table {
    id: String,
    comment: Option<String>,
    fields: IndexMap<String, Field>,
    indexes: Vec<Index>,
}

/// Serialized form of a [`Table`]; validated through [`TableBuilder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDef {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indexes: Vec<Index>,
}

impl TryFrom<TableDef> for Table {
    type Error = SchemaError;

    fn try_from(def: TableDef) -> Result<Self> {
        TableBuilder {
            id: def.id,
            comment: def.comment,
            fields: def.fields,
            indexes: def.indexes,
        }
        .build()
    }
}

impl From<Table> for TableDef {
    fn from(table: Table) -> Self {
        TableDef {
            id: table.id,
            comment: table.comment,
            fields: table.fields.into_values().collect(),
            indexes: table.indexes,
        }
    }
}

impl Table {
    pub fn builder(id: impl Into<String>) -> TableBuilder {
        TableBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Fields in column order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.primary)
    }

    /// Primary-key fields in key ordinal order.
    pub fn primary_keys(&self) -> Vec<&Field> {
        let mut keys: Vec<&Field> = self.fields.values().filter(|f| f.primary_key).collect();
        keys.sort_by_key(|f| f.primary_key_pos);
        keys
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_keys()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect()
    }

    /// The first non-unique index, if any.
    pub fn sorting_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| !i.primary && !i.unique)
    }

    /// Re-check every table invariant.
    pub fn validate(&self) -> Result<()> {
        for (i, field) in self.fields.values().enumerate() {
            if field.pos != i + 1 {
                return Err(SchemaError::NonDensePositions {
                    table: self.id.clone(),
                });
            }
        }

        let primary: Vec<&Index> = self.indexes.iter().filter(|i| i.primary).collect();
        if primary.len() > 1 {
            return Err(SchemaError::MultiplePrimaryIndexes {
                table: self.id.clone(),
            });
        }
        if let Some(index) = primary.first() {
            if !index.unique {
                return Err(SchemaError::PrimaryIndexNotUnique {
                    table: self.id.clone(),
                });
            }
            let key_names = self.primary_key_names();
            if index.field_names() != key_names {
                return Err(SchemaError::PrimaryIndexMismatch {
                    table: self.id.clone(),
                    index: index.field_names().iter().map(|s| s.to_string()).collect(),
                    primary_key: key_names.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        for index in &self.indexes {
            self.check_index_fields(index)?;
        }
        Ok(())
    }

    fn check_index_fields(&self, index: &Index) -> Result<()> {
        if index.fields.is_empty() {
            return Err(SchemaError::EmptyIndex {
                table: self.id.clone(),
                index: index.label(),
            });
        }
        for field in &index.fields {
            if !self.fields.contains_key(&field.name) {
                return Err(SchemaError::IndexFieldNotFound {
                    table: self.id.clone(),
                    index: index.label(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn not_found(&self, field: &str) -> SchemaError {
        SchemaError::FieldNotFound {
            table: self.id.clone(),
            field: field.to_string(),
        }
    }

    fn renumber(&mut self) {
        for (i, field) in self.fields.values_mut().enumerate() {
            field.pos = i + 1;
        }
    }

    /// Append a non-key field at the end of the column list.
    pub fn add_field(&mut self, mut field: Field) -> Result<()> {
        if self.fields.contains_key(&field.name) {
            return Err(SchemaError::DuplicateField {
                table: self.id.clone(),
                field: field.name,
            });
        }
        if field.primary_key {
            return Err(SchemaError::PrimaryKeyChange {
                table: self.id.clone(),
                field: field.name,
            });
        }
        field.pos = self.fields.len() + 1;
        field.primary_key_pos = None;
        self.fields.insert(field.name.clone(), field);
        Ok(())
    }

    /// Remove a non-key field. Indexes that lose all their fields are dropped.
    pub fn drop_field(&mut self, name: &str) -> Result<Field> {
        let is_key = self
            .fields
            .get(name)
            .map(|f| f.primary_key)
            .ok_or_else(|| self.not_found(name))?;
        if is_key {
            return Err(SchemaError::PrimaryKeyChange {
                table: self.id.clone(),
                field: name.to_string(),
            });
        }

        let removed = self
            .fields
            .shift_remove(name)
            .ok_or_else(|| self.not_found(name))?;
        self.renumber();

        for index in &mut self.indexes {
            index.fields.retain(|f| f.name != name);
        }
        self.indexes.retain(|i| !i.fields.is_empty());
        Ok(removed)
    }

    /// Rename a field in place, keeping its position and index membership.
    pub fn rename_field(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.fields.contains_key(from) {
            return Err(self.not_found(from));
        }
        if self.fields.contains_key(to) {
            return Err(SchemaError::DuplicateField {
                table: self.id.clone(),
                field: to.to_string(),
            });
        }

        self.fields = std::mem::take(&mut self.fields)
            .into_iter()
            .map(|(name, mut field)| {
                if name == from {
                    field.name = to.to_string();
                    (to.to_string(), field)
                } else {
                    (name, field)
                }
            })
            .collect();

        for index in &mut self.indexes {
            for field in &mut index.fields {
                if field.name == from {
                    field.name = to.to_string();
                }
            }
        }
        Ok(())
    }

    /// Replace a field's attributes (type, nullability, default, comment).
    ///
    /// Position and key membership are kept from the existing field.
    pub fn alter_field(&mut self, field: Field) -> Result<()> {
        let id = self.id.clone();
        let existing = self
            .fields
            .get_mut(&field.name)
            .ok_or_else(|| SchemaError::FieldNotFound {
                table: id.clone(),
                field: field.name.clone(),
            })?;
        if field.primary_key && !existing.primary_key {
            return Err(SchemaError::PrimaryKeyChange {
                table: id,
                field: field.name,
            });
        }

        existing.data_type = field.data_type;
        existing.nullable = field.nullable && !existing.primary_key;
        existing.default_value = field.default_value;
        existing.comment = field.comment;
        Ok(())
    }

    /// Add a non-primary index.
    pub fn add_index(&mut self, mut index: Index) -> Result<()> {
        if index.primary {
            return Err(SchemaError::MultiplePrimaryIndexes {
                table: self.id.clone(),
            });
        }
        self.check_index_fields(&index)?;
        if let Some(name) = &index.name {
            self.indexes.retain(|i| i.name.as_ref() != Some(name));
        }
        index.primary = false;
        self.indexes.push(index);
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles and validates a [`Table`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    id: String,
    comment: Option<String>,
    fields: Vec<Field>,
    indexes: Vec<Index>,
}

impl TableBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Build the table.
    ///
    /// Positions are assigned from declaration order. Primary-key ordinals
    /// follow any declared `primary_key_pos`, then declaration order. When no
    /// field is flagged as a key but a primary index is given, the index
    /// defines the key; when keys are flagged but no primary index is given,
    /// the primary index is derived from them.
    pub fn build(self) -> Result<Table> {
        let TableBuilder {
            id,
            comment,
            fields: declared,
            mut indexes,
        } = self;

        let mut seen = HashSet::new();
        for field in &declared {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    table: id,
                    field: field.name.clone(),
                });
            }
        }

        let mut fields: IndexMap<String, Field> = declared
            .into_iter()
            .enumerate()
            .map(|(i, mut field)| {
                field.pos = i + 1;
                (field.name.clone(), field)
            })
            .collect();

        if indexes.iter().filter(|i| i.primary).count() > 1 {
            return Err(SchemaError::MultiplePrimaryIndexes { table: id });
        }
        for index in &mut indexes {
            if index.primary {
                index.unique = true;
            }
        }

        let has_flagged_keys = fields.values().any(|f| f.primary_key);
        if !has_flagged_keys {
            if let Some(primary) = indexes.iter().find(|i| i.primary) {
                for (ordinal, key) in primary.fields.iter().enumerate() {
                    let field = fields.get_mut(&key.name).ok_or_else(|| {
                        SchemaError::IndexFieldNotFound {
                            table: id.clone(),
                            index: primary.label(),
                            field: key.name.clone(),
                        }
                    })?;
                    field.primary_key = true;
                    field.primary_key_pos = Some(ordinal + 1);
                }
            }
        }

        let mut key_order: Vec<(Option<usize>, usize, String)> = fields
            .values()
            .filter(|f| f.primary_key)
            .map(|f| (f.primary_key_pos, f.pos, f.name.clone()))
            .collect();
        key_order.sort_by_key(|(declared, pos, _)| (declared.unwrap_or(usize::MAX), *pos));
        for field in fields.values_mut() {
            if !field.primary_key {
                field.primary_key_pos = None;
            }
        }
        for (ordinal, (_, _, name)) in key_order.iter().enumerate() {
            if let Some(field) = fields.get_mut(name) {
                field.primary_key_pos = Some(ordinal + 1);
                field.nullable = false;
            }
        }

        if !key_order.is_empty() && !indexes.iter().any(|i| i.primary) {
            indexes.insert(
                0,
                Index::primary(key_order.iter().map(|(_, _, name)| name.clone())),
            );
        }

        let table = Table {
            id,
            comment,
            fields,
            indexes,
        };
        table.validate()?;
        Ok(table)
    }
}

// ============================================================================
// Schema file
// ============================================================================

/// A set of table descriptors loaded from YAML.
///
/// ```yaml
/// tables:
///   - id: orders
///     fields:
///       - name: id
///         type: big_int
///         primary_key: true
///       - name: total
///         type:
///           type: decimal
///           precision: 12
///           scale: 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    pub tables: Vec<Table>,
}

impl SchemaFile {
    /// Load a schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a schema from a YAML string. Every table is validated.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let schema: SchemaFile = serde_yaml::from_str(yaml)?;
        Ok(schema)
    }

    pub fn get_table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id() == id)
    }

    pub fn table(&self, id: &str) -> Result<&Table> {
        self.get_table(id)
            .ok_or_else(|| SchemaError::TableNotFound(id.to_string()))
    }
}
