//! Element factories and conversions into children and attribute values.

use std::fmt::Display;

use indexmap::IndexMap;
use tracing::trace;

use super::vnode::{format_number, Accessor, AttrValue, Child, Component, NodeType, Props, VNode};
use crate::reactive::{Memo, ReadSignal, RwSignal, Signal};

/// Build a VNode.
///
/// A `key` prop is moved into the node's key when no explicit key is given.
///
/// ```rust
/// use philjs_core::view::{jsx, Props};
///
/// let node = jsx("button", Props::new().class("primary").child("Save"), None);
/// assert_eq!(node.tag(), Some("button"));
/// ```
pub fn jsx(node_type: impl Into<NodeType>, mut props: Props, key: Option<String>) -> VNode {
    let key = key.or_else(|| match props.take_attr("key") {
        Some(AttrValue::Text(text)) => Some(text),
        Some(AttrValue::Number(number)) => Some(format_number(number)),
        _ => None,
    });
    VNode {
        node_type: node_type.into(),
        props,
        key,
    }
}

/// Build a VNode whose children are a static list.
pub fn jsxs(node_type: impl Into<NodeType>, props: Props, key: Option<String>) -> VNode {
    jsx(node_type, props, key)
}

/// Development variant of [`jsx`] that records where the node was built.
#[track_caller]
pub fn jsx_dev(node_type: impl Into<NodeType>, props: Props, key: Option<String>) -> VNode {
    let location = std::panic::Location::caller();
    let node = jsx(node_type, props, key);
    trace!(
        file = location.file(),
        line = location.line(),
        node = ?node.node_type,
        "jsx node created"
    );
    node
}

/// Group children without a wrapping element.
pub fn fragment<I, C>(children: I) -> VNode
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    jsx(NodeType::Fragment, Props::new().children(children), None)
}

/// Turn a render function into a component node type.
///
/// ```rust
/// use philjs_core::view::{component, jsx, Props};
///
/// let greeting = component(|props: &Props| {
///     format!("Hello, {}!", props.text("name").unwrap_or("world"))
/// });
/// let node = jsx(greeting, Props::new().attr("name", "Ada"), None);
/// ```
pub fn component<F, C>(render: F) -> Component
where
    F: Fn(&Props) -> C + Send + Sync + 'static,
    C: Into<Child>,
{
    Component::new(render)
}

/// A child region that follows `f`. Re-rendered when the signals `f`
/// reads change.
pub fn dynamic<F, C>(f: F) -> Child
where
    F: Fn() -> C + Send + Sync + 'static,
    C: Into<Child>,
{
    Child::Dynamic(Accessor::new(move || f().into()))
}

/// An attribute value that follows `f`.
pub fn dynamic_attr<F, V>(f: F) -> AttrValue
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<AttrValue>,
{
    AttrValue::Dynamic(Accessor::new(move || f().into()))
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

/// Booleans render nothing, so `cond && node` patterns work.
impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Child::Empty)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Accessor<Child>> for Child {
    fn from(accessor: Accessor<Child>) -> Self {
        Child::Dynamic(accessor)
    }
}

impl<T> From<Signal<T>> for Child
where
    T: Display + Clone + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Child::Dynamic(Accessor::new(move || Child::Text(signal.get().to_string())))
    }
}

impl<T> From<Memo<T>> for Child
where
    T: Display + Clone + Send + Sync + 'static,
{
    fn from(memo: Memo<T>) -> Self {
        Child::Dynamic(Accessor::new(move || Child::Text(memo.get().to_string())))
    }
}

impl<T> From<ReadSignal<T>> for Child
where
    T: Display + Clone + Send + Sync + 'static,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Child::Dynamic(Accessor::new(move || Child::Text(signal.get().to_string())))
    }
}

impl<T> From<RwSignal<T>> for Child
where
    T: Display + Clone + Send + Sync + 'static,
{
    fn from(signal: RwSignal<T>) -> Self {
        signal.read_only().into()
    }
}

macro_rules! number_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(value.to_string())
                }
            }

            // Written out exactly; wide integers and f32 do not round-trip through f64.
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    AttrValue::Text(value.to_string())
                }
            }
        )*
    };
}

number_conversions!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32);

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(format_number(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<&str> for AttrValue {
    fn from(text: &str) -> Self {
        AttrValue::Text(text.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(text: String) -> Self {
        AttrValue::Text(text)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttrValue::Null)
    }
}

impl From<IndexMap<String, String>> for AttrValue {
    fn from(style: IndexMap<String, String>) -> Self {
        AttrValue::Style(style)
    }
}

impl From<Accessor<AttrValue>> for AttrValue {
    fn from(accessor: Accessor<AttrValue>) -> Self {
        AttrValue::Dynamic(accessor)
    }
}

impl<T> From<Signal<T>> for AttrValue
where
    T: Into<AttrValue> + Clone + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        AttrValue::Dynamic(Accessor::new(move || signal.get().into()))
    }
}

impl<T> From<Memo<T>> for AttrValue
where
    T: Into<AttrValue> + Clone + Send + Sync + 'static,
{
    fn from(memo: Memo<T>) -> Self {
        AttrValue::Dynamic(Accessor::new(move || memo.get().into()))
    }
}

impl<T> From<ReadSignal<T>> for AttrValue
where
    T: Into<AttrValue> + Clone + Send + Sync + 'static,
{
    fn from(signal: ReadSignal<T>) -> Self {
        AttrValue::Dynamic(Accessor::new(move || signal.get().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_integers_keep_every_digit() {
        let big = u64::MAX;
        assert_eq!(
            AttrValue::from(big).to_attribute().as_deref(),
            Some("18446744073709551615")
        );
        let node = jsx("li", Props::new().attr("key", 9_007_199_254_740_993_i64), None);
        assert_eq!(node.key.as_deref(), Some("9007199254740993"));
        assert_eq!(AttrValue::from(2.5_f32).to_attribute().as_deref(), Some("2.5"));
    }

    #[test]
    fn key_prop_moves_to_node_key() {
        let node = jsx("li", Props::new().attr("key", "a").child("A"), None);
        assert_eq!(node.key.as_deref(), Some("a"));
        assert!(node.props.get("key").is_none());

        let explicit = jsx("li", Props::new().attr("key", "a"), Some("b".into()));
        assert_eq!(explicit.key.as_deref(), Some("b"));
    }

    #[test]
    fn conversions_into_children() {
        let props = Props::new()
            .child("text")
            .child(42)
            .child(false)
            .child(None::<&str>)
            .child(vec!["x", "y"]);
        assert_eq!(props.child_nodes().len(), 4);
    }

    #[test]
    fn fragment_holds_children() {
        let node = fragment(["a", "b"]);
        assert!(node.is_fragment());
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn signal_child_is_dynamic() {
        let count = Signal::new(1);
        let child: Child = count.clone().into();
        let Child::Dynamic(accessor) = child else {
            panic!("expected a dynamic child");
        };
        count.set(2);
        assert!(matches!(accessor.get(), Child::Text(text) if text == "2"));
    }

    #[test]
    fn read_halves_render_like_signals() {
        let (label, set_label) = crate::reactive::create_signal("a");
        let attr = AttrValue::from(label.clone());
        let child: Child = crate::reactive::RwSignal::new(3).into();

        set_label.set("b");
        assert_eq!(attr.to_attribute().as_deref(), Some("b"));
        let Child::Dynamic(accessor) = child else {
            panic!("expected a dynamic child");
        };
        assert!(matches!(accessor.get(), Child::Text(text) if text == "3"));
    }

    #[test]
    fn component_renders_props() {
        let greet = component(|props: &Props| format!("hi {}", props.text("name").unwrap_or("")));
        let props = Props::new().attr("name", "bo");
        assert!(matches!(greet.render(&props), Child::Text(text) if text == "hi bo"));
    }

    #[test]
    fn jsx_dev_builds_the_same_node() {
        let node = jsx_dev("span", Props::new(), Some("k".into()));
        assert_eq!(node.tag(), Some("span"));
        assert_eq!(node.key.as_deref(), Some("k"));
    }
}
