//! Schema node types and structures
//!
//! A [`SchemaNode`] is one unit of the schema-description graph: a kind tag,
//! kind-dependent child slots, and metadata. Children are either embedded nodes
//! or identifier references ([`Child`]), which is how one node can be shared by
//! several parents or reached again from inside its own subtree.
//!
//! The JSON shape mirrors what schema-description libraries serialize:
//!
//! ```json
//! { "uid": 3, "type": "object", "dict": { "name": { "uid": 4, "type": "string" } },
//!   "meta": { "required": true, "description": "A user" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ConvertError, Result};

/// Identifier of a node, unique within one conversion call
pub type NodeId = u64;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> NodeId {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// Type tag of a node
///
/// `Unknown` keeps a tag read from JSON that this crate does not recognize, so
/// the emitter can report it by name instead of failing at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    String,
    Number,
    Boolean,
    Any,
    Never,
    Const,
    Object,
    Dict,
    Array,
    Union,
    Intersect,
    Transform,
    Unknown(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Any => "any",
            NodeKind::Never => "never",
            NodeKind::Const => "const",
            NodeKind::Object => "object",
            NodeKind::Dict => "dict",
            NodeKind::Array => "array",
            NodeKind::Union => "union",
            NodeKind::Intersect => "intersect",
            NodeKind::Transform => "transform",
            NodeKind::Unknown(tag) => tag,
        }
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "string" => NodeKind::String,
            "number" => NodeKind::Number,
            "boolean" => NodeKind::Boolean,
            "any" => NodeKind::Any,
            "never" => NodeKind::Never,
            "const" => NodeKind::Const,
            "object" => NodeKind::Object,
            "dict" => NodeKind::Dict,
            "array" => NodeKind::Array,
            "union" => NodeKind::Union,
            "intersect" => NodeKind::Intersect,
            "transform" => NodeKind::Transform,
            _ => NodeKind::Unknown(tag),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child slot: an embedded node, or the identifier of a node defined elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    Ref(NodeId),
    Node(Box<SchemaNode>),
}

impl Child {
    /// Identifier of the node this slot points at, embedded or not
    pub fn id(&self) -> NodeId {
        match self {
            Child::Ref(id) => *id,
            Child::Node(node) => node.uid,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Child::Ref(_))
    }
}

impl From<SchemaNode> for Child {
    fn from(node: SchemaNode) -> Self {
        Child::Node(Box::new(node))
    }
}

impl From<NodeId> for Child {
    fn from(id: NodeId) -> Self {
        Child::Ref(id)
    }
}

/// Position of a child slot inside its parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// `inner` of dict, array and transform nodes
    Inner,
    /// Entry of a union or intersect `list`
    Item(usize),
    /// Property of an object node
    Property(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Inner => f.write_str("inner"),
            Slot::Item(index) => write!(f, "[{}]", index),
            Slot::Property(name) => write!(f, ".{}", name),
        }
    }
}

/// Node description: plain text, or one text per locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    /// `(locale, text)` pairs in the order the producer wrote them
    Localized(#[serde(with = "locale_texts")] Vec<(String, String)>),
}

impl Description {
    /// Render as a single string; localized texts are joined with newlines
    /// in the order they were given.
    pub fn render(&self) -> String {
        match self {
            Description::Text(text) => text.clone(),
            Description::Localized(texts) => texts
                .iter()
                .map(|(_, text)| text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A locale map as an ordered list of pairs; a repeated locale keeps its
/// first position and its last text.
mod locale_texts {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        texts: &[(String, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(texts.len()))?;
        for (locale, text) in texts {
            map.serialize_entry(locale, text)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, String)>, D::Error> {
        deserializer.deserialize_map(LocaleTexts)
    }

    struct LocaleTexts;

    impl<'de> Visitor<'de> for LocaleTexts {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of locale to text")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut texts: Vec<(String, String)> = Vec::new();
            while let Some((locale, text)) = access.next_entry::<String, String>()? {
                match texts.iter_mut().find(|(known, _)| *known == locale) {
                    Some(entry) => entry.1 = text,
                    None => texts.push((locale, text)),
                }
            }
            Ok(texts)
        }
    }
}

/// Display badge attached by the producing library (e.g. "deprecated")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub badge_type: Option<String>,
}

/// Regular expression constraint on string nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flags: String,
}

/// Metadata and primitive constraints of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<Badge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl NodeMeta {
    pub fn is_deprecated(&self) -> bool {
        self.badges.iter().any(|b| b.text == "deprecated")
    }

    pub fn is_empty(&self) -> bool {
        self == &NodeMeta::default()
    }
}

/// One node of the schema-description graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub uid: NodeId,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Single child of dict, array and transform nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Child>,

    /// Ordered children of union and intersect nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<Child>>,

    /// Properties of object nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dict: Option<BTreeMap<String, Child>>,

    /// Literal of const nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Nodes known to be shared, declared alongside this one
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<NodeId, SchemaNode>,

    #[serde(default, skip_serializing_if = "NodeMeta::is_empty")]
    pub meta: NodeMeta,
}

impl SchemaNode {
    /// Create a node of the given kind with a fresh identifier
    pub fn new(kind: NodeKind) -> Self {
        Self {
            uid: next_uid(),
            kind,
            inner: None,
            list: None,
            dict: None,
            value: None,
            refs: BTreeMap::new(),
            meta: NodeMeta::default(),
        }
    }

    pub fn string() -> Self {
        Self::new(NodeKind::String)
    }

    pub fn number() -> Self {
        Self::new(NodeKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(NodeKind::Boolean)
    }

    pub fn any() -> Self {
        Self::new(NodeKind::Any)
    }

    pub fn never() -> Self {
        Self::new(NodeKind::Never)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        let mut node = Self::new(NodeKind::Const);
        node.value = Some(value.into());
        node
    }

    pub fn object<I, K, C>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Child>,
    {
        let mut node = Self::new(NodeKind::Object);
        node.dict = Some(
            properties
                .into_iter()
                .map(|(name, child)| (name.into(), child.into()))
                .collect(),
        );
        node
    }

    pub fn dict(inner: impl Into<Child>) -> Self {
        Self::with_inner(NodeKind::Dict, inner)
    }

    pub fn array(inner: impl Into<Child>) -> Self {
        Self::with_inner(NodeKind::Array, inner)
    }

    pub fn transform(inner: impl Into<Child>) -> Self {
        Self::with_inner(NodeKind::Transform, inner)
    }

    pub fn union<I, C>(branches: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::with_list(NodeKind::Union, branches)
    }

    pub fn intersect<I, C>(branches: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Self::with_list(NodeKind::Intersect, branches)
    }

    fn with_inner(kind: NodeKind, inner: impl Into<Child>) -> Self {
        let mut node = Self::new(kind);
        node.inner = Some(inner.into());
        node
    }

    fn with_list<I, C>(kind: NodeKind, branches: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        let mut node = Self::new(kind);
        node.list = Some(branches.into_iter().map(Into::into).collect());
        node
    }

    // --- Modifiers ---

    /// Override the identifier (fixtures, or sharing a node by id)
    pub fn with_uid(mut self, uid: NodeId) -> Self {
        self.uid = uid;
        self
    }

    pub fn required(mut self) -> Self {
        self.meta.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.meta.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.meta.description = Some(Description::Text(text.into()));
        self
    }

    pub fn localized_description<I, L, T>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<String>,
    {
        self.meta.description = Some(Description::Localized(
            texts.into_iter().map(|(l, t)| (l.into(), t.into())).collect(),
        ));
        self
    }

    pub fn deprecated(mut self) -> Self {
        if !self.meta.is_deprecated() {
            self.meta.badges.push(Badge {
                text: "deprecated".to_string(),
                badge_type: Some("danger".to_string()),
            });
        }
        self
    }

    pub fn pattern(mut self, source: impl Into<String>) -> Self {
        self.meta.pattern = Some(Pattern {
            source: source.into(),
            flags: String::new(),
        });
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.meta.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.meta.max = Some(max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.meta.step = Some(step);
        self
    }

    /// Declare a shared node alongside this one without nesting it
    pub fn with_ref(mut self, node: SchemaNode) -> Self {
        self.refs.insert(node.uid, node);
        self
    }

    // --- Accessors ---

    pub fn is_required(&self) -> bool {
        self.meta.required
    }

    /// All child slots in a stable order: inner, list entries, then properties
    pub fn children(&self) -> Vec<(Slot, &Child)> {
        let mut slots = Vec::new();
        if let Some(inner) = &self.inner {
            slots.push((Slot::Inner, inner));
        }
        if let Some(list) = &self.list {
            slots.extend(list.iter().enumerate().map(|(i, c)| (Slot::Item(i), c)));
        }
        if let Some(dict) = &self.dict {
            slots.extend(dict.iter().map(|(k, c)| (Slot::Property(k.clone()), c)));
        }
        slots
    }

    /// True when no slot embeds a node and no known refs are attached
    pub fn is_flat(&self) -> bool {
        self.refs.is_empty() && self.children().iter().all(|(_, c)| c.is_ref())
    }

    /// Same node as `other` up to how its children are held (embedded or by id)
    pub fn same_shape(&self, other: &SchemaNode) -> bool {
        let ids = |n: &SchemaNode| -> Vec<(Slot, NodeId)> {
            n.children().into_iter().map(|(s, c)| (s, c.id())).collect()
        };
        self.uid == other.uid
            && self.kind == other.kind
            && self.value == other.value
            && self.meta == other.meta
            && ids(self) == ids(other)
    }

    /// Parse the serialized graph shape
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConvertError::malformed(e.to_string()))
    }

    /// Parse the serialized graph shape from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ConvertError::malformed(e.to_string()))
    }
}
