#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
#![allow(rustdoc::missing_crate_level_docs)] // it's an example

use eframe::egui;
use log::info;
use map_layer_tree::{
    LayerEvent, LayerHandle, LayerTree, NodeKey, config::LayerTreeConfig, listener,
};
use std::any::Any;

const CONFIG: &str = r#"{
    "roots": ["base", "topics"],
    "items": {
        "base": { "name": "Base maps", "children": ["osm", "topo"], "isChecked": true, "isExpanded": true },
        "osm": { "name": "OpenStreetMap", "type": "radio", "isBaseLayer": true, "isChecked": true,
                 "data": { "url": "https://tile.openstreetmap.org/{z}/{x}/{y}.png" } },
        "topo": { "name": "Topographic", "type": "radio", "isBaseLayer": true,
                  "data": { "url": "https://tile.opentopomap.org/{z}/{x}/{y}.png" } },
        "topics": { "name": "Topics", "children": ["transport", "nature"], "isChecked": true, "isExpanded": true },
        "transport": { "name": "Transport", "type": "radio", "children": ["roads", "rails"], "isChecked": true, "isExpanded": true },
        "roads": { "name": "Roads", "isChecked": true },
        "rails": { "name": "Railways", "isChecked": true },
        "nature": { "name": "Nature", "type": "radio", "children": ["forests", "lakes"], "isExpanded": true },
        "forests": { "name": "Forests" },
        "lakes": { "name": "Lakes" }
    }
}"#;

/// Stands in for the tile layer a map widget would show.
struct TileSource {
    url: String,
    visible: bool,
}

impl LayerHandle for TileSource {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn attach(&mut self) {
        info!("Attached tile source {}", self.url);
    }

    fn detach(&mut self) {
        info!("Detached tile source {}", self.url);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum Action {
    SetVisible(NodeKey, bool),
    ToggleExpanded(NodeKey),
}

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([480.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Layer switcher",
        options,
        Box::new(|_cc| Ok(Box::<MyApp>::default())),
    )
}

struct MyApp {
    tree: LayerTree,
}

impl Default for MyApp {
    fn default() -> Self {
        let config = LayerTreeConfig::from_json(CONFIG).expect("demo configuration is valid");
        let mut tree = config
            .build_with(|_, data| {
                let url = data.get("url")?.as_str()?.to_string();
                Some(Box::new(TileSource {
                    url,
                    visible: false,
                }) as Box<dyn LayerHandle>)
            })
            .expect("demo configuration is valid");

        tree.on(
            LayerEvent::ChangeVisible,
            listener(|tree, change| {
                if let Some(node) = tree.node(change.key) {
                    info!("{} is now {}", node.name, if change.visible { "visible" } else { "hidden" });
                }
            }),
        );

        Self { tree }
    }
}

impl MyApp {
    fn show_node(&self, ui: &mut egui::Ui, key: NodeKey, actions: &mut Vec<Action>) {
        let Some(node) = self.tree.node(key) else {
            return;
        };

        ui.horizontal(|ui| {
            if !node.children().is_empty() {
                let icon = if node.expanded { "⏷" } else { "⏵" };
                if ui.small_button(icon).clicked() {
                    actions.push(Action::ToggleExpanded(key));
                }
            }

            if node.radio_group.is_some() {
                if ui.radio(node.visible(), node.name.as_str()).clicked() {
                    actions.push(Action::SetVisible(key, true));
                }
            } else {
                let mut visible = node.visible();
                if ui.checkbox(&mut visible, node.name.as_str()).changed() {
                    actions.push(Action::SetVisible(key, visible));
                }
            }
        });

        if node.expanded {
            ui.indent(key, |ui| {
                for child in node.children() {
                    self.show_node(ui, *child, actions);
                }
            });
        }
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut actions = Vec::new();

        egui::SidePanel::left("layers")
            .resizable(false)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Layers");
                for root in self.tree.roots() {
                    self.show_node(ui, *root, &mut actions);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Visible tile sources");
            for key in self.tree.visible_layers() {
                let Some(node) = self.tree.node(key) else {
                    continue;
                };
                if let Some(source) = node.handle_as::<TileSource>() {
                    if source.visible {
                        ui.label(format!("{}: {}", node.name, source.url));
                    }
                }
            }
        });

        for action in actions {
            match action {
                Action::SetVisible(key, visible) => {
                    self.tree.set_visible(key, visible);
                }
                Action::ToggleExpanded(key) => {
                    if let Some(node) = self.tree.node_mut(key) {
                        node.expanded = !node.expanded;
                    }
                }
            }
        }
    }
}
