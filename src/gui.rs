//! Desktop window with the strip charts of the four channels

use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, RichText};
use egui_plot::{Line, Plot, PlotPoints};
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

use crate::{
    chart::ChartModel,
    color::{clamp_kelvin, hsbk_to_rgb, Channel, Hsbk},
    models::ChartConfig,
    worker::{MatchEvent, MatchRunner},
};

const PLOT_HEIGHT: f32 = 90.0;

/// Live values of the four channels
///
/// Updated with every color sent to the bulb, and editable while the match loop is stopped. The
/// current values seed the next match loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelValues {
    color: Hsbk,
}

impl ChannelValues {
    pub fn new(color: Hsbk) -> Self {
        Self { color }
    }

    pub fn get(&self, channel: Channel) -> u16 {
        self.color.channel(channel)
    }

    pub fn set(&mut self, channel: Channel, value: u16) {
        self.color.set_channel(channel, value);
    }

    pub fn set_all(&mut self, color: Hsbk) {
        self.color = Hsbk {
            kelvin: clamp_kelvin(color.kelvin),
            ..color
        };
    }

    pub fn get_color_values_hsbk(&self) -> Hsbk {
        self.color
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Idle,
    Running,
    DeviceError(String),
    Failed(String),
}

pub struct ChartWindow {
    runner: MatchRunner,
    events: mpsc::Receiver<MatchEvent>,
    chart: ChartModel,
    values: ChannelValues,
    status: Status,
    redraw: Duration,
}

impl ChartWindow {
    pub fn new(
        runner: MatchRunner,
        events: mpsc::Receiver<MatchEvent>,
        config: &ChartConfig,
        seed: Hsbk,
    ) -> Self {
        Self {
            runner,
            events,
            chart: ChartModel::new(config, seed),
            values: ChannelValues::new(seed),
            status: Status::Idle,
            redraw: Duration::from_millis(config.redraw_ms),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                MatchEvent::Started => self.status = Status::Running,
                MatchEvent::Sample(color) => {
                    self.values.set_all(color);
                    self.status = Status::Running;
                }
                MatchEvent::DeviceError(error) => self.status = Status::DeviceError(error),
                MatchEvent::Stopped => self.status = Status::Idle,
                MatchEvent::Failed(error) => self.status = Status::Failed(error),
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let running = self.runner.is_running();

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!running, egui::Button::new("Start"))
                .clicked()
            {
                let seed = self.values.get_color_values_hsbk();
                if let Err(error) = self.runner.start(seed) {
                    warn!(error = %error, "could not start color match");
                }
            }

            if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                self.runner.stop();
            }

            if ui
                .add_enabled(!running, egui::Button::new("Once"))
                .clicked()
            {
                let seed = self.values.get_color_values_hsbk();
                if let Err(error) = self.runner.start_once(seed) {
                    warn!(error = %error, "could not start color match");
                }
            }

            ui.separator();
            ui.label(self.runner.label());
        });

        ui.horizontal(|ui| {
            for channel in Channel::iter() {
                let name: &'static str = channel.into();
                let mut value = self.values.get(channel);

                ui.label(name);
                let response = ui.add_enabled(
                    !running,
                    egui::DragValue::new(&mut value).range(0..=channel.max_value()),
                );

                if response.changed() {
                    self.values.set(channel, value);
                }
            }

            let rgb = hsbk_to_rgb(self.values.get_color_values_hsbk());
            let (rect, _) = ui.allocate_exact_size(egui::vec2(24.0, 24.0), egui::Sense::hover());
            ui.painter()
                .rect_filled(rect, 4.0, Color32::from_rgb(rgb.red, rgb.green, rgb.blue));
        });

        match &self.status {
            Status::Idle => {
                ui.label("Stopped");
            }
            Status::Running => {
                ui.label("Running");
            }
            Status::DeviceError(error) => {
                ui.label(RichText::new(format!("Device error: {}", error)).color(Color32::YELLOW));
            }
            Status::Failed(error) => {
                ui.label(RichText::new(format!("Failed: {}", error)).color(Color32::RED));
            }
        }
    }

    fn charts(&self, ui: &mut egui::Ui) {
        for channel in Channel::iter() {
            let name: &'static str = channel.into();
            let (min, max) = ChartModel::y_range(channel);

            ui.label(name);
            Plot::new(name)
                .height(PLOT_HEIGHT)
                .include_y(min)
                .include_y(max)
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .allow_boxed_zoom(false)
                .show_x(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::from(self.chart.series(channel))));
                });
        }
    }
}

impl eframe::App for ChartWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        let now = Instant::now();
        self.chart.tick(now, self.values.get_color_values_hsbk());

        egui::CentralPanel::default().show(ctx, |ui| {
            self.controls(ui);
            ui.separator();
            self.charts(ui);
        });

        ctx.request_repaint_after(self.chart.until_next_redraw(now).min(self.redraw));
    }
}

/// Open the chart window, returning when it is closed
pub fn run(
    runner: MatchRunner,
    events: mpsc::Receiver<MatchEvent>,
    config: &ChartConfig,
    seed: Hsbk,
) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 600.0])
            .with_title("lightmatch"),
        ..Default::default()
    };

    let window = ChartWindow::new(runner, events, config, seed);
    eframe::run_native("lightmatch", options, Box::new(|_cc| Ok(Box::new(window))))
}
