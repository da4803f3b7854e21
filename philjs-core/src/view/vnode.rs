//! VNode data model.
//!
//! A [`VNode`] is plain data: a node type, its props and an optional key.
//! Children live in the props and are normalized when they are added, so
//! renderers never see nested lists or empty children.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dom::Event;

/// A reactive accessor: a shared closure producing the current value.
pub struct Accessor<T> {
    get: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Accessor<T> {
    /// Wrap a closure.
    pub fn new<F>(get: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self { get: Arc::new(get) }
    }

    /// Evaluate the accessor. Tracked when called inside a computation.
    pub fn get(&self) -> T {
        (self.get)()
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor(..)")
    }
}

/// An event listener attached through props.
#[derive(Clone)]
pub struct EventHandler {
    handler: Arc<dyn Fn(&Event) + Send + Sync>,
}

impl EventHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn call(&self, event: &Event) {
        (self.handler)(event)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

/// A function component.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Arc<dyn Fn(&Props) -> Child + Send + Sync>,
}

impl Component {
    /// Wrap a render function.
    pub fn new<F, C>(render: F) -> Self
    where
        F: Fn(&Props) -> C + Send + Sync + 'static,
        C: Into<Child>,
    {
        Self {
            name: std::any::type_name::<F>(),
            render: Arc::new(move |props| render(props).into()),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Call the component with its props.
    pub fn render(&self, props: &Props) -> Child {
        (self.render)(props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// What a VNode stands for.
#[derive(Clone, Debug)]
pub enum NodeType {
    /// An intrinsic element such as `div`.
    Tag(String),
    /// Children without a wrapping element.
    Fragment,
    /// A function component.
    Component(Component),
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Tag(tag.to_string())
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::Tag(tag)
    }
}

impl From<Component> for NodeType {
    fn from(component: Component) -> Self {
        NodeType::Component(component)
    }
}

/// An attribute value.
#[derive(Clone, Debug)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    /// `true` renders the bare attribute, `false` omits it.
    Bool(bool),
    /// Inline style declarations, in insertion order.
    Style(IndexMap<String, String>),
    Handler(EventHandler),
    /// Re-evaluated whenever the signals it reads change.
    Dynamic(Accessor<AttrValue>),
    Null,
}

impl AttrValue {
    /// Evaluate dynamic values until a static one is reached.
    pub fn resolve(&self) -> AttrValue {
        match self {
            AttrValue::Dynamic(accessor) => accessor.get().resolve(),
            other => other.clone(),
        }
    }

    /// The string an element attribute should hold, or `None` when the
    /// attribute must be absent. Dynamic values are evaluated.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            AttrValue::Text(text) => Some(text.clone()),
            AttrValue::Number(number) => Some(format_number(*number)),
            AttrValue::Bool(true) => Some(String::new()),
            AttrValue::Bool(false) | AttrValue::Null | AttrValue::Handler(_) => None,
            AttrValue::Style(style) => Some(style_to_string(style)),
            AttrValue::Dynamic(accessor) => accessor.get().to_attribute(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, AttrValue::Dynamic(_))
    }
}

/// A child of an element, fragment or component.
#[derive(Clone, Debug)]
pub enum Child {
    Text(String),
    Node(VNode),
    /// A region whose content follows a reactive accessor.
    Dynamic(Accessor<Child>),
    /// Flattened when inserted into [`Props`]; only seen as the output of
    /// components and accessors.
    List(Vec<Child>),
    Empty,
}

impl Child {
    /// Check if the child renders nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Child::Empty => true,
            Child::Text(text) => text.is_empty(),
            Child::List(items) => items.iter().all(Child::is_empty),
            _ => false,
        }
    }
}

/// Flatten nested lists and drop children that render nothing.
pub fn normalize_children<I>(children: I) -> Vec<Child>
where
    I: IntoIterator<Item = Child>,
{
    let mut out = Vec::new();
    push_normalized(&mut out, children);
    out
}

fn push_normalized<I>(out: &mut Vec<Child>, children: I)
where
    I: IntoIterator<Item = Child>,
{
    for child in children {
        match child {
            Child::List(items) => push_normalized(out, items),
            Child::Empty => {}
            Child::Text(text) if text.is_empty() => {}
            other => out.push(other),
        }
    }
}

/// Attributes and children of a VNode.
#[derive(Clone, Debug, Default)]
pub struct Props {
    attrs: IndexMap<String, AttrValue>,
    children: Vec<Child>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute. Setting the same name twice keeps the last value.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the `class` attribute.
    pub fn class(self, value: impl Into<AttrValue>) -> Self {
        self.attr("class", value)
    }

    /// Set the `style` attribute from `(property, value)` pairs.
    pub fn style<I, K, V>(self, declarations: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let style = declarations
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.attr("style", AttrValue::Style(style))
    }

    /// Attach an event handler, stored as `on:<event>`.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.attr(
            format!("on:{event}"),
            AttrValue::Handler(EventHandler::new(handler)),
        )
    }

    /// Append one child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        push_normalized(&mut self.children, [child.into()]);
        self
    }

    /// Append several children.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        push_normalized(&mut self.children, children.into_iter().map(Into::into));
        self
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Look up a text attribute.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Attributes in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The normalized children.
    pub fn child_nodes(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn take_attr(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.shift_remove(name)
    }
}

/// A virtual DOM node.
#[derive(Clone, Debug)]
pub struct VNode {
    pub node_type: NodeType,
    pub props: Props,
    pub key: Option<String>,
}

impl VNode {
    /// The tag name for intrinsic elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.node_type, NodeType::Fragment)
    }

    pub fn children(&self) -> &[Child] {
        self.props.child_nodes()
    }
}

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(tag))
}

/// Map JSX prop names onto HTML attribute names.
pub fn attribute_name(prop: &str) -> &str {
    match prop {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

/// Props that configure the runtime and never reach the DOM.
pub fn is_reserved_prop(prop: &str) -> bool {
    matches!(prop, "key" | "ref" | "children" | "innerHTML")
}

/// The event an `on:click` or `onClick` prop listens to.
pub fn event_name(prop: &str) -> Option<String> {
    if let Some(event) = prop.strip_prefix("on:") {
        return (!event.is_empty()).then(|| event.to_string());
    }
    let rest = prop.strip_prefix("on")?;
    if rest.chars().next()?.is_ascii_uppercase() {
        Some(rest.to_ascii_lowercase())
    } else {
        None
    }
}

/// Integer-valued numbers print without a fractional part.
pub fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Serialize a style map to `prop:value;prop:value`.
pub fn style_to_string(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(property, value)| format!("{}:{}", css_property(property), value))
        .collect::<Vec<_>>()
        .join(";")
}

fn css_property(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    let mut out = String::with_capacity(property.len() + 4);
    for ch in property.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
