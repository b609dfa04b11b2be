//! Cursor mapping between block text offsets and live node positions.
//!
//! Lengths are measured in source chars: a line break counts as one char
//! (the `\n` it stands for), a placeholder counts as nothing, a non-breaking
//! space counts as the space it replaced.

use crate::host::{HostSurface, LiveKind, LiveNode, PLACEHOLDER, SurfacePoint};

/// Surface coordinate of the most recent pointer interaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorReference {
    pub x: f64,
    pub y: f64,
}

impl CursorReference {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Source length of a subtree
pub fn text_len(node: &LiveNode) -> usize {
    match &node.kind {
        LiveKind::Text(text) => source_len(text),
        LiveKind::LineBreak => 1,
        LiveKind::Element { children, .. } => children.iter().map(text_len).sum(),
    }
}

/// Offset -> node position, used to restore the caret after a text change.
///
/// Walks text nodes in document order until `offset` falls inside one. An
/// offset the tree cannot hold resolves to the root's trailing boundary.
pub fn point_for_offset(root: &LiveNode, offset: usize) -> SurfacePoint {
    let mut remaining = offset;
    find_point(root, &mut remaining)
        .unwrap_or_else(|| SurfacePoint::new(root.handle, root.children().len()))
}

fn find_point(node: &LiveNode, remaining: &mut usize) -> Option<SurfacePoint> {
    match &node.kind {
        LiveKind::Text(text) => {
            let len = source_len(text);
            if *remaining <= len {
                return Some(SurfacePoint::new(node.handle, dom_offset(text, *remaining)));
            }
            *remaining -= len;
            None
        }
        // Handled by the parent so the caret can sit before the break
        LiveKind::LineBreak => None,
        LiveKind::Element { children, .. } => {
            if children.is_empty() && *remaining == 0 {
                return Some(SurfacePoint::new(node.handle, 0));
            }
            for (index, child) in children.iter().enumerate() {
                if matches!(child.kind, LiveKind::LineBreak) {
                    if *remaining == 0 {
                        return Some(SurfacePoint::new(node.handle, index));
                    }
                    *remaining -= 1;
                    continue;
                }
                if let Some(point) = find_point(child, remaining) {
                    return Some(point);
                }
            }
            None
        }
    }
}

/// Node position -> offset, used to read the caret on key events.
///
/// Returns `None` when `point.node` is not inside `root`.
pub fn offset_for_point(root: &LiveNode, point: SurfacePoint) -> Option<usize> {
    let mut running = 0;
    locate(root, point, &mut running)
}

fn locate(node: &LiveNode, point: SurfacePoint, running: &mut usize) -> Option<usize> {
    if node.handle == point.node {
        let local = match &node.kind {
            LiveKind::Text(text) => source_offset(text, point.offset),
            LiveKind::LineBreak => 0,
            LiveKind::Element { children, .. } => {
                children.iter().take(point.offset).map(text_len).sum()
            }
        };
        return Some(*running + local);
    }

    match &node.kind {
        LiveKind::Text(text) => {
            *running += source_len(text);
            None
        }
        LiveKind::LineBreak => {
            *running += 1;
            None
        }
        LiveKind::Element { children, .. } => children
            .iter()
            .find_map(|child| locate(child, point, running)),
    }
}

/// Deepest first text-bearing node of a block
pub fn first_text_node(root: &LiveNode) -> Option<&LiveNode> {
    match &root.kind {
        LiveKind::Text(_) => Some(root),
        LiveKind::LineBreak => None,
        LiveKind::Element { children, .. } => children.iter().find_map(first_text_node),
    }
}

/// Caret is at block start when it sits on the container at offset 0, or on
/// the first text node at offset 0.
pub fn is_at_block_start(root: &LiveNode, point: SurfacePoint) -> bool {
    if point.offset != 0 {
        return false;
    }
    point.node == root.handle || first_text_node(root).is_some_and(|node| node.handle == point.node)
}

/// Re-derive a caret position from the last pointer coordinate, trying the
/// host's primary point query before its fallback.
pub fn point_from_reference<H>(host: &H, reference: CursorReference) -> Option<SurfacePoint>
where
    H: HostSurface + ?Sized,
{
    host.caret_position_from_point(reference.x, reference.y)
        .or_else(|| host.caret_range_from_point(reference.x, reference.y))
}

fn source_len(text: &str) -> usize {
    text.chars().filter(|&ch| ch != PLACEHOLDER).count()
}

/// Source offset of a node-local char offset
fn source_offset(text: &str, dom_offset: usize) -> usize {
    text.chars()
        .take(dom_offset)
        .filter(|&ch| ch != PLACEHOLDER)
        .count()
}

/// Node-local char offset of a source offset within one text node
fn dom_offset(text: &str, source_offset: usize) -> usize {
    let mut seen = 0;
    for (index, ch) in text.chars().enumerate() {
        if seen == source_offset {
            return index;
        }
        if ch != PLACEHOLDER {
            seen += 1;
        }
    }
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{NBSP, NodeHandle};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    /// "ab\n\n  cd" in source view
    fn block() -> LiveNode {
        LiveNode::element(
            h(1),
            "div",
            vec![
                LiveNode::text(h(2), "ab"),
                LiveNode::line_break(h(3)),
                LiveNode::text(h(4), PLACEHOLDER.to_string()),
                LiveNode::line_break(h(5)),
                LiveNode::text(h(6), format!("{NBSP}{NBSP}cd")),
            ],
        )
    }

    #[test]
    fn test_text_len_counts_breaks_not_placeholders() {
        assert_eq!(text_len(&block()), 8);
    }

    #[rstest]
    #[case(0, 2, 0)]
    #[case(1, 2, 1)]
    #[case(2, 2, 2)]
    #[case(3, 4, 0)]
    #[case(4, 6, 0)]
    #[case(6, 6, 2)]
    #[case(8, 6, 4)]
    fn test_point_for_offset(#[case] offset: usize, #[case] node: u64, #[case] local: usize) {
        assert_eq!(point_for_offset(&block(), offset), SurfacePoint::new(h(node), local));
    }

    #[test]
    fn test_point_for_offset_past_end_falls_back_to_trailing_boundary() {
        assert_eq!(point_for_offset(&block(), 50), SurfacePoint::new(h(1), 5));
    }

    #[rstest]
    #[case(2, 0, 0)]
    #[case(2, 2, 2)]
    #[case(4, 0, 3)]
    #[case(4, 1, 3)]
    #[case(6, 3, 7)]
    #[case(1, 0, 0)]
    #[case(1, 2, 3)]
    #[case(1, 5, 8)]
    fn test_offset_for_point(#[case] node: u64, #[case] local: usize, #[case] expected: usize) {
        assert_eq!(
            offset_for_point(&block(), SurfacePoint::new(h(node), local)),
            Some(expected)
        );
    }

    #[test]
    fn test_offset_for_foreign_node_is_none() {
        assert_eq!(offset_for_point(&block(), SurfacePoint::new(h(42), 0)), None);
    }

    #[test]
    fn test_offset_round_trip_through_points() {
        let root = block();
        for offset in 0..=text_len(&root) {
            let point = point_for_offset(&root, offset);
            assert_eq!(offset_for_point(&root, point), Some(offset), "offset {offset}");
        }
    }

    #[test]
    fn test_caret_before_leading_break() {
        let root = LiveNode::element(
            h(1),
            "div",
            vec![LiveNode::line_break(h(2)), LiveNode::text(h(3), "x")],
        );
        assert_eq!(point_for_offset(&root, 0), SurfacePoint::new(h(1), 0));
        assert_eq!(point_for_offset(&root, 1), SurfacePoint::new(h(3), 0));
    }

    #[test]
    fn test_empty_element_holds_offset_zero() {
        let root = LiveNode::element(h(1), "div", vec![]);
        assert_eq!(point_for_offset(&root, 0), SurfacePoint::new(h(1), 0));
    }

    #[test]
    fn test_start_of_block_detection() {
        let root = block();
        assert!(is_at_block_start(&root, SurfacePoint::new(h(1), 0)));
        assert!(is_at_block_start(&root, SurfacePoint::new(h(2), 0)));
        assert!(!is_at_block_start(&root, SurfacePoint::new(h(2), 1)));
        assert!(!is_at_block_start(&root, SurfacePoint::new(h(4), 0)));
    }

    #[test]
    fn test_first_text_node_is_deepest() {
        let root = LiveNode::element(
            h(1),
            "div",
            vec![LiveNode::element(
                h(2),
                "p",
                vec![LiveNode::element(h(3), "strong", vec![LiveNode::text(h(4), "x")])],
            )],
        );
        assert_eq!(first_text_node(&root).map(|n| n.handle), Some(h(4)));
    }
}
