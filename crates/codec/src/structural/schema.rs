//! Declarative schemas for composite types
//!
//! A schema pairs a composite type with its members: a stable field id, an
//! optional explicit order, a getter and a setter. It is built once per type
//! with [`SchemaBuilder`] and then owned by the type's structural codec.
//!
//! Members are sorted by `(order, member name)` ascending, with unordered
//! members after every ordered one. That sequence is the compact layout; the
//! tagged layout is keyed by field id and does not depend on it.

use crate::codec::{erased, CodecKind, ErasedCodec, SerializationMode};
use crate::persist::Persist;
use crate::registry::Registry;
use crate::structural::StructuralCodec;
use keystash_core::{BinaryReader, BinaryWriter, DynValue, Result};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-member options for [`SchemaBuilder::field_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    member: String,
    id: Option<String>,
    order: Option<i32>,
    ignore: bool,
}

impl FieldOptions {
    /// Options for the member with the given name
    pub fn new(member: impl Into<String>) -> Self {
        FieldOptions {
            member: member.into(),
            id: None,
            order: None,
            ignore: false,
        }
    }

    /// Pin the on-wire field id independently of the member name
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Explicit sort position
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Exclude the member from persistence
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Typed access to one member, erased over the member type
pub(crate) trait FieldAccess<T>: Send + Sync {
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, owner: &T) -> Result<()>;
    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>, owner: &mut T)
        -> Result<()>;
    fn assign_dynamic(&self, registry: &Registry, value: &DynValue, owner: &mut T) -> Result<()>;
    fn render(&self, registry: &Registry, owner: &T) -> String;
}

struct Accessor<T, F, G, S> {
    get: G,
    set: S,
    _marker: PhantomData<fn(&T) -> F>,
}

impl<T, F, G, S> FieldAccess<T> for Accessor<T, F, G, S>
where
    T: 'static,
    F: Persist,
    G: Fn(&T) -> &F + Send + Sync,
    S: Fn(&mut T, F) + Send + Sync,
{
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, owner: &T) -> Result<()> {
        registry.write(writer, (self.get)(owner))
    }

    fn read(
        &self,
        registry: &Registry,
        reader: &mut BinaryReader<'_>,
        owner: &mut T,
    ) -> Result<()> {
        let value = registry.read::<F>(reader)?;
        (self.set)(owner, value);
        Ok(())
    }

    fn assign_dynamic(&self, registry: &Registry, value: &DynValue, owner: &mut T) -> Result<()> {
        let value = registry.from_dynamic::<F>(value)?;
        (self.set)(owner, value);
        Ok(())
    }

    fn render(&self, registry: &Registry, owner: &T) -> String {
        registry.render((self.get)(owner))
    }
}

/// One persisted member
pub struct Field<T> {
    pub(crate) id: String,
    pub(crate) member: String,
    pub(crate) order: Option<i32>,
    pub(crate) type_name: String,
    pub(crate) access: Box<dyn FieldAccess<T>>,
}

impl<T> Field<T> {
    /// Stable on-wire id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Member name
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Explicit order, if any
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// Wire type name of the member
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn sort_key(&self) -> (i64, &str) {
        (self.order.map(i64::from).unwrap_or(i64::MAX), &self.member)
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("member", &self.member)
            .field("order", &self.order)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Member list and settings for one composite type
pub struct Schema<T> {
    pub(crate) name: String,
    pub(crate) version: u32,
    pub(crate) fields: Vec<Field<T>>,
    pub(crate) null_aware: bool,
    pub(crate) mode: Option<SerializationMode>,
    pub(crate) ignored: Vec<String>,
}

impl<T> Schema<T>
where
    T: Persist + Default,
{
    /// Start a schema for the type with the given wire name
    pub fn builder(name: impl Into<String>) -> SchemaBuilder<T> {
        SchemaBuilder {
            schema: Schema {
                name: name.into(),
                version: 1,
                fields: Vec::new(),
                null_aware: true,
                mode: None,
                ignored: Vec::new(),
            },
        }
    }
}

impl<T> Schema<T> {
    /// Wire type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data version written by this schema
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Members in on-wire order
    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// Members excluded with [`FieldOptions::ignore`]
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Whether the compact layout carries a presence flag
    pub fn is_null_aware(&self) -> bool {
        self.null_aware
    }

    /// Layout override, if any
    pub fn mode(&self) -> Option<SerializationMode> {
        self.mode
    }

    /// `Name { id: value, ... }` in on-wire member order
    pub fn render(&self, registry: &Registry, value: &T) -> String {
        let members: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}: {}", field.id, field.access.render(registry, value)))
            .collect();
        if members.is_empty() {
            self.name.clone()
        } else {
            format!("{} {{ {} }}", self.name, members.join(", "))
        }
    }

    /// Field ids declared by more than one member, sorted
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for field in &self.fields {
            *counts.entry(field.id.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder<T> {
    schema: Schema<T>,
}

impl<T> SchemaBuilder<T>
where
    T: Persist + Default,
{
    /// Data version (default 1)
    pub fn version(mut self, version: u32) -> Self {
        self.schema.version = version;
        self
    }

    /// Whether the compact layout writes a presence flag (default true)
    pub fn null_aware(mut self, null_aware: bool) -> Self {
        self.schema.null_aware = null_aware;
        self
    }

    /// Use this layout regardless of the registry default
    pub fn mode(mut self, mode: SerializationMode) -> Self {
        self.schema.mode = Some(mode);
        self
    }

    /// Add a member whose field id is its name
    pub fn field<F, G, S>(self, member: &str, get: G, set: S) -> Self
    where
        F: Persist,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.field_with(FieldOptions::new(member), get, set)
    }

    /// Add a member with explicit options
    pub fn field_with<F, G, S>(mut self, options: FieldOptions, get: G, set: S) -> Self
    where
        F: Persist,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        if options.ignore {
            self.schema.ignored.push(options.member);
            return self;
        }
        let id = options.id.unwrap_or_else(|| options.member.clone());
        self.schema.fields.push(Field {
            id,
            member: options.member,
            order: options.order,
            type_name: F::type_name(),
            access: Box::new(Accessor {
                get,
                set,
                _marker: PhantomData,
            }),
        });
        self
    }

    /// Finish the schema, sorting members into on-wire order
    pub fn build(mut self) -> Schema<T> {
        self.schema
            .fields
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.schema
    }

    /// Finish the schema and wrap it in an erased structural codec
    pub fn into_codec(self, registry: &Registry) -> Arc<dyn ErasedCodec> {
        let codec = StructuralCodec::new(self.build(), registry);
        erased::<T, _>(CodecKind::Structural, codec)
    }
}
