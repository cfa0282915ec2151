use folder_tree::{DropOutcome, FolderInfo, FolderTree, SortMethod, manual_order};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::ActiveTheme as _;
use gpui_component::button::{Button, ButtonVariants as _};
use gpui_component::list::ListItem;
use gpui_component::{h_flex, v_flex};
use gpui_dnd_folders::{DndFolderEntry, DndFolderRowState, DndFoldersState, dnd_folders};

use crate::preferences::Preferences;

pub struct FoldersExample {
    folders: Entity<DndFoldersState<FolderInfo>>,
}

impl FoldersExample {
    pub fn view(preferences: Preferences, _window: &mut Window, cx: &mut App) -> Entity<Self> {
        let tree = match demo_tree(&preferences) {
            Ok(tree) => tree,
            Err(err) => {
                tracing::error!(error = %err, "failed to build demo tree");
                FolderTree::with_options(preferences.tree)
            }
        };
        let folders = cx.new(|cx| {
            DndFoldersState::new(tree, cx)
                .drop_options(preferences.drop)
                .on_move(|outcome, tree| {
                    if let DropOutcome::Moved { parent, index, nodes } = outcome {
                        tracing::info!(%parent, index, ?nodes, "folders moved");
                    }
                    match serde_json::to_string(&manual_order(tree)) {
                        Ok(order) => tracing::debug!(%order, "new folder order"),
                        Err(err) => tracing::warn!(error = %err, "failed to encode folder order"),
                    }
                })
        });
        cx.new(|_| Self { folders })
    }

    fn set_sort_method(&mut self, method: SortMethod, cx: &mut Context<Self>) {
        self.folders.update(cx, |state, cx| {
            state.update_tree(|tree| tree.set_sort_method(method), cx);
        });
        cx.notify();
    }
}

impl Render for FoldersExample {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let state = self.folders.read(cx);
        let tree = state.tree();
        let outline = tree.outline(tree.root());
        let sort_method = tree.sort_method();
        let selected = state
            .selected_entry()
            .map(|entry| entry.label().to_string())
            .unwrap_or_else(|| "<none>".to_string());

        let sort_button = |id: &'static str, label: &'static str, method: SortMethod| {
            Button::new(id)
                .label(label)
                .when(sort_method == method, |this| this.primary())
                .when(sort_method != method, |this| this.ghost())
                .on_click(cx.listener(move |this, _, _window, cx| {
                    this.set_sort_method(method, cx);
                }))
        };

        v_flex()
            .size_full()
            .p(px(16.))
            .gap_y_3()
            .child(
                v_flex()
                    .gap_y_1()
                    .child(div().text_xl().font_weight(FontWeight::BOLD).child("Folders"))
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child("Drag feeds and groups. Top third of a row drops above it, bottom third below, the middle of a group drops inside. A group can't go inside itself."),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(format!("Selected: {selected}")),
                    ),
            )
            .child(
                h_flex()
                    .gap_x_1()
                    .child(sort_button("sort-manual", "Manual", SortMethod::Manual))
                    .child(sort_button("sort-asc", "A-Z", SortMethod::ByNameAscending))
                    .child(sort_button("sort-desc", "Z-A", SortMethod::ByNameDescending)),
            )
            .child(
                h_flex()
                    .flex_1()
                    .min_h(px(0.))
                    .gap_x_3()
                    .child(
                        v_flex()
                            .w(px(360.))
                            .min_w(px(0.))
                            .h_full()
                            .gap_y_2()
                            .child(div().text_sm().font_weight(FontWeight::MEDIUM).child("Subscriptions"))
                            .child(
                                div()
                                    .flex_1()
                                    .min_h(px(0.))
                                    .rounded(px(12.))
                                    .border_1()
                                    .border_color(theme.border)
                                    .bg(theme.background)
                                    .child(dnd_folders(
                                        &self.folders,
                                        move |ix, entry, row_state, _window, cx| {
                                            render_folder_row(ix, entry, row_state, cx)
                                        },
                                    )),
                            ),
                    )
                    .child(
                        v_flex()
                            .flex_1()
                            .min_w(px(0.))
                            .h_full()
                            .gap_y_2()
                            .child(
                                div()
                                    .text_sm()
                                    .font_weight(FontWeight::MEDIUM)
                                    .child("Debug (outline)"),
                            )
                            .child(
                                div()
                                    .flex_1()
                                    .min_h(px(0.))
                                    .rounded(px(12.))
                                    .border_1()
                                    .border_color(theme.border)
                                    .bg(theme.background)
                                    .p(px(12.))
                                    .child(render_outline(outline)),
                            ),
                    ),
            )
    }
}

fn render_folder_row(
    ix: usize,
    entry: &DndFolderEntry,
    row_state: DndFolderRowState,
    cx: &mut App,
) -> ListItem {
    let theme = cx.theme();
    let indent = px(16.) * entry.depth();
    let marker = match (entry.can_have_children(), entry.is_expanded()) {
        (true, true) => "▾",
        (true, false) => "▸",
        (false, _) => "•",
    };
    let marker_color = if row_state.selected {
        theme.foreground
    } else {
        theme.muted_foreground
    };

    ListItem::new(ix)
        .pl(px(10.) + indent)
        .when(row_state.dragging, |this| this.opacity(0.4))
        .child(
            h_flex()
                .gap_x_2()
                .items_center()
                .child(div().w(px(12.)).text_color(marker_color).child(marker))
                .child(entry.label().clone()),
        )
}

fn render_outline(text: String) -> impl IntoElement {
    let lines = text
        .lines()
        .map(|line| div().text_sm().child(line.to_string()));
    v_flex().gap_y_0p5().children(lines)
}

fn demo_tree(preferences: &Preferences) -> folder_tree::Result<FolderTree<FolderInfo>> {
    let mut tree = FolderTree::with_options(preferences.tree);
    let root = tree.root();

    let news = tree.insert_folder(root, usize::MAX, FolderInfo::group(1, "News"))?;
    tree.insert_folder(news, usize::MAX, FolderInfo::feed(2, "World"))?;
    tree.insert_folder(news, usize::MAX, FolderInfo::feed(3, "Business"))?;
    let local = tree.insert_folder(news, usize::MAX, FolderInfo::group(4, "Local"))?;
    tree.insert_folder(local, usize::MAX, FolderInfo::feed(5, "City Hall"))?;
    tree.insert_folder(local, usize::MAX, FolderInfo::feed(6, "Weather"))?;

    let tech = tree.insert_folder(root, usize::MAX, FolderInfo::group(7, "Tech"))?;
    tree.insert_folder(tech, usize::MAX, FolderInfo::feed(8, "Rust Blog"))?;
    tree.insert_folder(tech, usize::MAX, FolderInfo::feed(9, "This Week in Rust"))?;
    tree.insert_folder(tech, usize::MAX, FolderInfo::feed(10, "LWN"))?;

    tree.insert_folder(root, usize::MAX, FolderInfo::feed(11, "Comics"))?;
    tree.insert_folder(root, usize::MAX, FolderInfo::group(12, "Read Later"))?;
    tree.insert_folder(root, usize::MAX, FolderInfo::feed(13, "Podcasts"))?;

    Ok(tree)
}
