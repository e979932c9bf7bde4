//! Integration tests for nested messages, groups and recursion limits, using
//! hand-written message implementations.

use bytes::BufMut;
use tightbuf::sink;
use tightbuf::wire::{make_tag, WireType};
use tightbuf::{DecodeError, ProtoMessage, ProtoSource, DEFAULT_RECURSION_LIMIT};

const VALUE_TAG: u32 = make_tag(1, WireType::Varint);
const CHILD_TAG: u32 = make_tag(2, WireType::Len);
const GROUP_TAG: u32 = make_tag(5, WireType::SGroup);

/// `message Node { int32 value = 1; Node child = 2; }`
#[derive(Debug, Default, PartialEq)]
struct Node {
    has_bits: [u32; 1],
    value: i32,
    child: Option<Box<Node>>,
}

impl Node {
    fn chain(depth: usize) -> Node {
        let mut node = Node::default();
        node.set_value(0);
        for level in 1..=depth {
            let mut parent = Node::default();
            parent.set_value(i32::try_from(level).unwrap());
            parent.child = Some(Box::new(node));
            parent.has_bits[0] |= 0x2;
            node = parent;
        }
        node
    }

    fn set_value(&mut self, value: i32) {
        self.value = value;
        self.has_bits[0] |= 0x1;
    }

    fn depth(&self) -> usize {
        match &self.child {
            Some(child) => 1 + child.depth(),
            None => 0,
        }
    }
}

impl ProtoMessage for Node {
    fn merge_from(&mut self, input: &mut ProtoSource<'_>) -> Result<(), DecodeError> {
        loop {
            let tag = input.read_tag()?;
            match tag {
                VALUE_TAG => {
                    self.value = input.read_int32()?;
                    self.has_bits[0] |= 0x1;
                }
                CHILD_TAG => {
                    let child = self.child.get_or_insert_with(Box::default);
                    input.read_message(&mut **child)?;
                    self.has_bits[0] |= 0x2;
                }
                0 => return Ok(()),
                _ => {
                    if !input.skip_field(tag)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        if self.has_bits[0] & 0x1 != 0 {
            sink::write_tag(buf, VALUE_TAG);
            sink::write_int32_no_tag(buf, self.value);
        }
        if let Some(child) = self.child.as_deref().filter(|_| self.has_bits[0] & 0x2 != 0) {
            sink::write_tag(buf, CHILD_TAG);
            sink::write_message_no_tag(buf, child);
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.has_bits[0] & 0x1 != 0 {
            len += sink::compute_tag_size(VALUE_TAG) + sink::compute_int32_size_no_tag(self.value);
        }
        if let Some(child) = self.child.as_deref().filter(|_| self.has_bits[0] & 0x2 != 0) {
            len += sink::compute_tag_size(CHILD_TAG) + sink::compute_message_size_no_tag(child);
        }
        len
    }

    fn clear(&mut self) {
        self.has_bits = [0; 1];
        self.value = 0;
        if let Some(child) = self.child.as_deref_mut() {
            child.clear();
        }
    }
}

/// `message Holder { group Inner = 5 { Node node = 2; } }`, flattened.
#[derive(Debug, Default, PartialEq)]
struct Holder {
    inner: Node,
}

impl ProtoMessage for Holder {
    fn merge_from(&mut self, input: &mut ProtoSource<'_>) -> Result<(), DecodeError> {
        loop {
            let tag = input.read_tag()?;
            match tag {
                GROUP_TAG => input.read_group(5, &mut self.inner)?,
                0 => return Ok(()),
                _ => {
                    if !input.skip_field(tag)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        sink::write_group(buf, 5, &self.inner);
    }

    fn encoded_len(&self) -> usize {
        sink::compute_group_size(5, &self.inner)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }
}

#[test]
fn test_nested_roundtrip() {
    let node = Node::chain(3);
    let bytes = node.to_vec();
    assert_eq!(bytes.len(), node.encoded_len());

    let decoded = Node::parse_from(&bytes).unwrap();
    assert_eq!(decoded, node);
    assert_eq!(decoded.depth(), 3);
}

#[test]
fn test_recursion_limit_boundary() {
    let limit = usize::try_from(DEFAULT_RECURSION_LIMIT).unwrap();

    let ok = Node::chain(limit).to_vec();
    let decoded = Node::parse_from(&ok).unwrap();
    assert_eq!(decoded.depth(), limit);

    let too_deep = Node::chain(limit + 1).to_vec();
    assert_eq!(
        Node::parse_from(&too_deep),
        Err(DecodeError::RecursionLimitExceeded)
    );
}

#[test]
fn test_custom_recursion_limit() {
    let bytes = Node::chain(3).to_vec();

    let mut node = Node::default();
    let mut input = ProtoSource::new(&bytes);
    input.set_recursion_limit(2);
    assert_eq!(
        node.merge_from(&mut input),
        Err(DecodeError::RecursionLimitExceeded)
    );
}

#[test]
fn test_merge_reuses_child() {
    let mut node = Node::chain(1);
    let bytes = Node::chain(1).to_vec();

    let child_ptr: *const Node = node.child.as_deref().unwrap();
    node.merge_from_bytes(&bytes).unwrap();
    let after: *const Node = node.child.as_deref().unwrap();
    assert_eq!(child_ptr, after);
}

#[test]
fn test_child_length_past_parent() {
    // child claims 5 bytes but only 2 follow.
    let bytes = [0x12, 0x05, 0x08, 0x01];
    assert_eq!(Node::parse_from(&bytes), Err(DecodeError::Truncated));
}

#[test]
fn test_end_group_inside_message_is_rejected() {
    // child = { <end group 4> }
    let bytes = [0x12, 0x01, 0x24];
    assert_eq!(Node::parse_from(&bytes), Err(DecodeError::InvalidEndTag));

    // A stray end-group at the top level.
    assert_eq!(Node::parse_from(&[0x24]), Err(DecodeError::InvalidEndTag));
}

#[test]
fn test_unknown_fields_are_skipped() {
    let mut bytes = Vec::new();
    sink::write_tag(&mut bytes, make_tag(9, WireType::Len));
    sink::write_string_no_tag(&mut bytes, "ignored");
    sink::write_tag(&mut bytes, VALUE_TAG);
    sink::write_int32_no_tag(&mut bytes, -7);
    sink::write_tag(&mut bytes, make_tag(10, WireType::I32));
    sink::write_fixed32_no_tag(&mut bytes, 3);

    let node = Node::parse_from(&bytes).unwrap();
    assert_eq!(node.value, -7);
    assert_eq!(node.has_bits[0], 0x1);
}

#[test]
fn test_group_roundtrip() {
    let holder = Holder {
        inner: Node::chain(2),
    };
    let bytes = holder.to_vec();
    assert_eq!(bytes.first(), Some(&0x2B));
    assert_eq!(bytes.last(), Some(&0x2C));
    assert_eq!(bytes.len(), holder.encoded_len());
    assert_eq!(Holder::parse_from(&bytes).unwrap(), holder);
}

#[test]
fn test_group_wrong_end_tag() {
    // start group 5, value = 1, end group 6
    let bytes = [0x2B, 0x08, 0x01, 0x34];
    assert_eq!(Holder::parse_from(&bytes), Err(DecodeError::InvalidEndTag));
}

#[test]
fn test_clear_keeps_child_allocation() {
    let mut node = Node::chain(1);
    node.clear();
    assert_eq!(node.has_bits, [0]);
    assert!(node.child.is_some());
    assert!(node.to_vec().is_empty());
}
