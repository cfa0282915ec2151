use std::{collections::HashSet, ops::Range, rc::Rc};

use folder_tree::{
    DragSession, DropHighlight, DropIntentResolver, DropOptions, DropOutcome, FolderPayload,
    FolderTree, NodeId, RowHit,
};
use gpui::{
    App, AppContext as _, Bounds, Context, ElementId, Entity, EntityId, FocusHandle,
    InteractiveElement as _, IntoElement, ListSizingBehavior, ParentElement as _, Pixels, Point,
    Render, RenderOnce, SharedString, StatefulInteractiveElement as _, StyleRefinement, Styled,
    UniformListScrollHandle, Window, div, prelude::FluentBuilder as _, px, uniform_list,
};
use gpui_component::list::ListItem;
use gpui_component::scroll::{Scrollbar, ScrollbarState};
use gpui_component::{ActiveTheme as _, StyledExt as _};

const CONTEXT: &str = "DndFolders";

/// Create a [`DndFolders`].
pub fn dnd_folders<P, R>(state: &Entity<DndFoldersState<P>>, render_item: R) -> DndFolders<P>
where
    P: FolderPayload + 'static,
    R: Fn(usize, &DndFolderEntry, DndFolderRowState, &mut Window, &mut App) -> ListItem + 'static,
{
    DndFolders::new(state, render_item)
}

#[derive(Clone)]
struct DndFoldersDrag {
    tree_id: EntityId,
    node: NodeId,
    label: SharedString,
}

struct DragGhost {
    label: SharedString,
}

impl DragGhost {
    fn new(label: SharedString) -> Self {
        Self { label }
    }
}

impl Render for DragGhost {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        div()
            .px(px(10.))
            .py(px(6.))
            .rounded(px(8.))
            .bg(theme.popover)
            .border_1()
            .border_color(theme.border)
            .shadow_md()
            .text_color(theme.popover_foreground)
            .text_sm()
            .child(self.label.clone())
    }
}

/// One visible row: a folder and its depth below the root.
#[derive(Clone, Debug)]
pub struct DndFolderEntry {
    node: NodeId,
    label: SharedString,
    depth: usize,
    can_have_children: bool,
    has_children: bool,
    expanded: bool,
}

impl DndFolderEntry {
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn label(&self) -> &SharedString {
        &self.label
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn can_have_children(&self) -> bool {
        self.can_have_children
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DndFolderRowState {
    pub selected: bool,
    pub dragging: bool,
    pub drop_highlight: DropHighlight,
}

type OnMove<P> = Rc<dyn Fn(&DropOutcome, &FolderTree<P>)>;

/// State for a folder tree with drag-and-drop reordering.
pub struct DndFoldersState<P> {
    focus_handle: FocusHandle,
    tree: FolderTree<P>,
    resolver: DropIntentResolver,
    session: DragSession,
    hover_bounds: Option<Bounds<Pixels>>,
    entries: Vec<DndFolderEntry>,
    synced_revision: Option<u64>,
    collapsed: HashSet<NodeId>,
    scrollbar_state: ScrollbarState,
    scroll_handle: UniformListScrollHandle,
    selected: Option<NodeId>,
    on_move: Option<OnMove<P>>,
    render_item:
        Rc<dyn Fn(usize, &DndFolderEntry, DndFolderRowState, &mut Window, &mut App) -> ListItem>,
}

impl<P: FolderPayload + 'static> DndFoldersState<P> {
    pub fn new(tree: FolderTree<P>, cx: &mut App) -> Self {
        let mut state = Self {
            focus_handle: cx.focus_handle(),
            tree,
            resolver: DropIntentResolver::default(),
            session: DragSession::new(),
            hover_bounds: None,
            entries: Vec::new(),
            synced_revision: None,
            collapsed: HashSet::new(),
            scrollbar_state: ScrollbarState::default(),
            scroll_handle: UniformListScrollHandle::default(),
            selected: None,
            on_move: None,
            render_item: Rc::new(|_, _, _, _, _| ListItem::new("dnd-folders-empty")),
        };
        state.sync_entries();
        state
    }

    pub fn drop_options(mut self, options: DropOptions) -> Self {
        self.resolver = DropIntentResolver::new(options);
        self
    }

    /// Provide a callback invoked after a drop moved folders, e.g. to save the new order.
    pub fn on_move(mut self, on_move: impl Fn(&DropOutcome, &FolderTree<P>) + 'static) -> Self {
        self.on_move = Some(Rc::new(on_move));
        self
    }

    pub fn tree(&self) -> &FolderTree<P> {
        &self.tree
    }

    /// Mutate the tree; rows are rebuilt on the next render.
    pub fn update_tree<R>(
        &mut self,
        update: impl FnOnce(&mut FolderTree<P>) -> R,
        cx: &mut Context<Self>,
    ) -> R {
        let result = update(&mut self.tree);
        if self.selected.is_some_and(|node| !self.tree.is_attached(node)) {
            self.selected = None;
        }
        cx.notify();
        result
    }

    pub fn entries(&self) -> &[DndFolderEntry] {
        &self.entries
    }

    pub fn selected_node(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn set_selected_node(&mut self, node: Option<NodeId>, cx: &mut Context<Self>) {
        self.selected = node;
        cx.notify();
    }

    pub fn selected_entry(&self) -> Option<&DndFolderEntry> {
        let node = self.selected?;
        self.entries.iter().find(|entry| entry.node == node)
    }

    pub fn set_expanded(&mut self, node: NodeId, expanded: bool, cx: &mut Context<Self>) {
        let changed = if expanded {
            self.collapsed.remove(&node)
        } else {
            self.collapsed.insert(node)
        };
        if changed {
            self.synced_revision = None;
            cx.notify();
        }
    }

    fn sync_entries(&mut self) {
        let revision = self.tree.revision();
        if self.synced_revision == Some(revision) {
            return;
        }
        tracing::trace!(revision, "rebuilding folder rows");

        self.collapsed.retain(|node| self.tree.contains(*node));
        self.entries = visible_entries(&self.tree, &self.collapsed);
        self.synced_revision = Some(revision);
    }

    fn on_entry_click(
        &mut self,
        ix: usize,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let Some(entry) = self.entries.get(ix) else {
            return;
        };
        let node = entry.node;
        let expanded = entry.expanded;
        let has_children = entry.has_children;
        self.selected = Some(node);
        if has_children {
            self.set_expanded(node, !expanded, cx);
        }
        cx.notify();
    }

    fn on_drag_start(&mut self, drag: &DndFoldersDrag, _window: &mut Window, cx: &mut Context<Self>) {
        self.hover_bounds = None;
        if self
            .resolver
            .drag_began(&mut self.session, &self.tree, [drag.node])
        {
            self.selected = Some(drag.node);
        }
        cx.notify();
    }

    fn on_drag_move(
        &mut self,
        event: &gpui::DragMoveEvent<DndFoldersDrag>,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if !cx.has_active_drag() {
            return;
        }
        // Rows only report moves inside themselves; the gap below the last
        // row and the outside of the list are handled here.
        let position = event.event.position;
        if event.bounds.contains(&position) && !pointer_left_row(self.hover_bounds, position) {
            return;
        }
        self.hover_bounds = None;
        let before = self.session.hover_state();
        self.resolver.drag_moved(&mut self.session, &self.tree, None);
        if self.session.hover_state() != before {
            cx.notify();
        }
    }

    fn on_row_drag_move(
        &mut self,
        row_ix: usize,
        event: &gpui::DragMoveEvent<DndFoldersDrag>,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if !cx.has_active_drag() {
            return;
        }

        let drag = event.drag(cx);
        if drag.tree_id != cx.entity_id() {
            return;
        }

        let mouse_position = event.event.position;
        if !event.bounds.contains(&mouse_position) {
            return;
        }
        let Some(entry) = self.entries.get(row_ix) else {
            return;
        };

        let row_height = event.bounds.size.height;
        let fraction = if row_height > px(0.) {
            (mouse_position.y - event.bounds.origin.y) / row_height
        } else {
            0.5
        };
        let hit = RowHit {
            row: row_ix,
            node: entry.node,
            fraction,
        };

        let before = self.session.hover_state();
        self.resolver
            .drag_moved(&mut self.session, &self.tree, Some(hit));
        self.hover_bounds = Some(event.bounds);
        if self.session.hover_state() != before {
            cx.notify();
        }
    }

    fn on_drop_on_row(
        &mut self,
        drag: &DndFoldersDrag,
        _target_ix: usize,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.hover_bounds = None;
        let accepted = drag.tree_id == cx.entity_id();
        let outcome = self
            .resolver
            .drag_ended(&mut self.session, &mut self.tree, accepted);

        match &outcome {
            DropOutcome::Moved { parent, nodes, .. } => {
                self.collapsed.remove(parent);
                self.selected = nodes.first().copied();
                if let Some(on_move) = self.on_move.as_ref() {
                    on_move(&outcome, &self.tree);
                }
            }
            DropOutcome::Rejected(err) => {
                tracing::debug!(error = %err, "folder drop refused");
            }
            DropOutcome::Cancelled => {}
        }
        cx.notify();
    }

    fn on_drop_after_last(
        &mut self,
        _drag: &DndFoldersDrag,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        // Released below the last row: not a valid target.
        self.hover_bounds = None;
        self.resolver.drag_cancelled(&mut self.session);
        cx.notify();
    }
}

impl<P: FolderPayload + 'static> Render for DndFoldersState<P> {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if !cx.has_active_drag() && self.session.is_dragging() {
            self.hover_bounds = None;
            self.resolver.drag_cancelled(&mut self.session);
        }
        self.sync_entries();

        let render_item = Rc::clone(&self.render_item);
        let state_entity = cx.entity();
        let tree_id = cx.entity_id();

        div()
            .id("dnd-folders-state")
            .size_full()
            .relative()
            .child(
                uniform_list("folders", self.entries.len(), {
                    cx.processor(move |state, visible_range: Range<usize>, window, cx| {
                        let drop_target_bg = cx.theme().drop_target;
                        let drag_border = cx.theme().drag_border;
                        let mut items = Vec::with_capacity(visible_range.len());
                        for ix in visible_range {
                            let entry = &state.entries[ix];
                            let selected = Some(entry.node) == state.selected;
                            let dragging =
                                state.session.is_source(entry.node) && cx.has_active_drag();
                            let drop_highlight = state.session.highlight_for_row(ix);

                            let row_state = DndFolderRowState {
                                selected,
                                dragging,
                                drop_highlight,
                            };

                            let item = (render_item)(ix, entry, row_state, window, cx);
                            let drag_value = DndFoldersDrag {
                                tree_id,
                                node: entry.node,
                                label: entry.label.clone(),
                            };

                            let line = |top: bool| {
                                div()
                                    .absolute()
                                    .left_0()
                                    .right_0()
                                    .h(px(2.))
                                    .bg(drag_border)
                                    .when(top, |this| this.top_0())
                                    .when(!top, |this| this.bottom_0())
                            };

                            let row = div()
                                .id(ix)
                                .relative()
                                .when(drop_highlight == DropHighlight::OnItem, |this| {
                                    this.bg(drop_target_bg)
                                })
                                .child(item.selected(selected))
                                .when(drop_highlight == DropHighlight::Above, |this| {
                                    this.child(line(true))
                                })
                                .when(drop_highlight == DropHighlight::Below, |this| {
                                    this.child(line(false))
                                })
                                .on_drag_move::<DndFoldersDrag>(cx.listener(
                                    move |this, ev, window, cx| {
                                        this.on_row_drag_move(ix, ev, window, cx);
                                    },
                                ))
                                .on_drop::<DndFoldersDrag>(cx.listener(
                                    move |this, drag, window, cx| {
                                        this.on_drop_on_row(drag, ix, window, cx);
                                    },
                                ))
                                .on_click(cx.listener(move |this, click_event, window, cx| {
                                    this.on_entry_click(ix, click_event, window, cx);
                                }))
                                .on_drag(drag_value, {
                                    let state_entity = state_entity.clone();
                                    move |drag, _offset, window, cx| {
                                        state_entity.update(cx, |state, cx| {
                                            state.on_drag_start(drag, window, cx);
                                        });
                                        let label = drag.label.clone();
                                        cx.new(|_| DragGhost::new(label))
                                    }
                                });

                            items.push(row);
                        }
                        items
                    })
                })
                .on_drag_move::<DndFoldersDrag>(cx.listener(Self::on_drag_move))
                .on_drop::<DndFoldersDrag>(cx.listener(Self::on_drop_after_last))
                .flex_grow()
                .size_full()
                .track_scroll(self.scroll_handle.clone())
                .with_sizing_behavior(ListSizingBehavior::Auto)
                .into_any_element(),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .right_0()
                    .bottom_0()
                    .w(px(12.))
                    .child(Scrollbar::uniform_scroll(
                        &self.scrollbar_state,
                        &self.scroll_handle,
                    )),
            )
    }
}

/// A folder tree element with drag-and-drop reordering.
#[derive(IntoElement)]
pub struct DndFolders<P: FolderPayload + 'static> {
    id: ElementId,
    state: Entity<DndFoldersState<P>>,
    style: StyleRefinement,
    render_item:
        Rc<dyn Fn(usize, &DndFolderEntry, DndFolderRowState, &mut Window, &mut App) -> ListItem>,
}

impl<P: FolderPayload + 'static> DndFolders<P> {
    pub fn new<R>(state: &Entity<DndFoldersState<P>>, render_item: R) -> Self
    where
        R: Fn(usize, &DndFolderEntry, DndFolderRowState, &mut Window, &mut App) -> ListItem
            + 'static,
    {
        Self {
            id: ElementId::Name(format!("dnd-folders-{}", state.entity_id()).into()),
            state: state.clone(),
            style: StyleRefinement::default(),
            render_item: Rc::new(move |ix, entry, row_state, window, cx| {
                render_item(ix, entry, row_state, window, cx)
            }),
        }
    }
}

impl<P: FolderPayload + 'static> Styled for DndFolders<P> {
    fn style(&mut self) -> &mut StyleRefinement {
        &mut self.style
    }
}

impl<P: FolderPayload + 'static> RenderOnce for DndFolders<P> {
    fn render(self, _window: &mut Window, cx: &mut App) -> impl IntoElement {
        let focus_handle = self.state.read(cx).focus_handle.clone();
        self.state
            .update(cx, |state, _| state.render_item = self.render_item);

        div()
            .id(self.id)
            .key_context(CONTEXT)
            .track_focus(&focus_handle)
            .size_full()
            .child(self.state)
            .refine_style(&self.style)
    }
}

/// Whether `position` has moved off the row that produced the current hover.
fn pointer_left_row(row_bounds: Option<Bounds<Pixels>>, position: Point<Pixels>) -> bool {
    row_bounds.is_some_and(|bounds| !bounds.contains(&position))
}

/// Flatten the tree into rows, depth-first, skipping children of collapsed nodes.
fn visible_entries<P: FolderPayload>(
    tree: &FolderTree<P>,
    collapsed: &HashSet<NodeId>,
) -> Vec<DndFolderEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = tree
        .children(tree.root())
        .iter()
        .rev()
        .map(|id| (*id, 0))
        .collect();
    while let Some((node, depth)) = stack.pop() {
        let expanded = !collapsed.contains(&node);
        entries.push(DndFolderEntry {
            node,
            label: tree.name(node).unwrap_or_default().to_string().into(),
            depth,
            can_have_children: tree.can_have_children(node),
            has_children: tree.count_of_children(node) > 0,
            expanded,
        });
        if expanded {
            stack.extend(tree.children(node).iter().rev().map(|id| (*id, depth + 1)));
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use folder_tree::{FolderInfo, SortMethod};

    use super::*;

    fn rows(entries: &[DndFolderEntry]) -> Vec<(&str, usize)> {
        entries
            .iter()
            .map(|entry| (entry.label().as_ref(), entry.depth()))
            .collect()
    }

    fn sample() -> (FolderTree<FolderInfo>, NodeId) {
        let mut tree = FolderTree::new();
        let root = tree.root();
        let news = tree
            .insert_folder(root, usize::MAX, FolderInfo::group(1, "News"))
            .unwrap();
        tree.insert_folder(news, usize::MAX, FolderInfo::feed(2, "World"))
            .unwrap();
        tree.insert_folder(root, usize::MAX, FolderInfo::feed(3, "Comics"))
            .unwrap();
        (tree, news)
    }

    #[test]
    fn rows_follow_tree_order() {
        let (tree, news) = sample();
        let entries = visible_entries(&tree, &HashSet::new());
        assert_eq!(rows(&entries), [("News", 0), ("World", 1), ("Comics", 0)]);
        assert_eq!(entries[0].node(), news);
        assert!(entries[0].can_have_children() && entries[0].has_children());
        assert!(!entries[2].can_have_children());
    }

    #[test]
    fn collapsed_groups_hide_children() {
        let (mut tree, news) = sample();
        tree.set_sort_method(SortMethod::ByNameAscending);
        let entries = visible_entries(&tree, &HashSet::from([news]));
        assert_eq!(rows(&entries), [("Comics", 0), ("News", 0)]);
        assert!(!entries[1].is_expanded());
    }

    #[test]
    fn leaving_the_hovered_row_clears_the_hover() {
        let last_row = Bounds::new(gpui::point(px(0.), px(48.)), gpui::size(px(200.), px(24.)));
        let inside = gpui::point(px(40.), px(60.));
        let below_rows = gpui::point(px(40.), px(90.));

        assert!(!pointer_left_row(Some(last_row), inside));
        assert!(pointer_left_row(Some(last_row), below_rows));
        assert!(!pointer_left_row(None, below_rows));
    }

    #[test]
    fn pointer_below_rows_drops_highlight() {
        let (tree, news) = sample();
        let entries = visible_entries(&tree, &HashSet::new());
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        let comics = entries[2].node();
        assert!(resolver.drag_began(&mut session, &tree, [news]));

        let last_row = Bounds::new(gpui::point(px(0.), px(48.)), gpui::size(px(200.), px(24.)));
        resolver.drag_moved(
            &mut session,
            &tree,
            Some(RowHit {
                row: 2,
                node: comics,
                fraction: 0.9,
            }),
        );
        assert_eq!(session.highlight_for_row(2), DropHighlight::Below);

        if pointer_left_row(Some(last_row), gpui::point(px(40.), px(90.))) {
            resolver.drag_moved(&mut session, &tree, None);
        }
        assert_eq!(session.highlight_for_row(2), DropHighlight::None);
        assert!(session.hover_state().is_none());
    }

    #[test]
    fn empty_tree_has_no_rows() {
        let tree: FolderTree<FolderInfo> = FolderTree::new();
        assert!(visible_entries(&tree, &HashSet::new()).is_empty());
    }
}
