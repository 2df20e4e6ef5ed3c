use std::{path::PathBuf, time::Duration};

use iced::{
    alignment::{Horizontal, Vertical},
    font,
    time::{self, Instant},
    widget::{container, text},
    window, Background, Border, Color, Element, Font, Length, Point, Size, Subscription, Task,
    Theme,
};

use crate::counter::read_count;

const MARGIN: f32 = 30.0;
const WINDOW_WIDTH: f32 = 120.0;
const WINDOW_HEIGHT: f32 = 60.0;

#[derive(Debug, Clone)]
pub enum Message {
    Refresh(Instant),
    Loaded(u64),
}

/// Always-on-top label showing the count stored in the counter file.
struct Overlay {
    counter_file: PathBuf,
    refresh: Duration,
    count: u64,
}

impl Overlay {
    fn reload(&self) -> Task<Message> {
        let path = self.counter_file.clone();
        Task::future(async move { Message::Loaded(read_count(path).await) })
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Refresh(_now) => self.reload(),
            Message::Loaded(count) => {
                self.count = count;
                Task::none()
            }
        }
    }

    fn view(&self) -> Element<Message> {
        let label = text(self.count.to_string()).size(16).font(Font {
            weight: font::Weight::Bold,
            ..Font::DEFAULT
        });

        // Hug the bottom-right corner so the margin is measured from the label itself.
        container(container(label).padding(10).style(label_style))
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(Horizontal::Right)
            .align_y(Vertical::Bottom)
            .into()
    }

    /// Only the label is drawn, the rest of the window stays see-through.
    fn style(&self, _theme: &Theme) -> iced::application::Appearance {
        iced::application::Appearance {
            background_color: Color::TRANSPARENT,
            text_color: Color::WHITE,
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        time::every(self.refresh).map(Message::Refresh)
    }
}

fn label_style(_theme: &Theme) -> container::Style {
    container::Style {
        text_color: Some(Color::WHITE),
        background: Some(Background::Color(Color::from_rgba8(0, 0, 0, 0.5))),
        border: Border {
            radius: 10.0.into(),
            ..Border::default()
        },
        ..container::Style::default()
    }
}

fn bottom_right(window: Size, monitor: Size) -> Point {
    Point::new(
        monitor.width - window.width - MARGIN,
        monitor.height - window.height - MARGIN,
    )
}

/// Keeps the overlay off the taskbar.
#[cfg(windows)]
fn platform_specific() -> window::settings::PlatformSpecific {
    window::settings::PlatformSpecific {
        skip_taskbar: true,
        ..Default::default()
    }
}

#[cfg(not(windows))]
fn platform_specific() -> window::settings::PlatformSpecific {
    Default::default()
}

/// Blocks the calling thread, which must be the main one, until the window is closed.
pub fn run(counter_file: PathBuf, refresh: Duration) -> iced::Result {
    iced::application("Deaths", Overlay::update, Overlay::view)
        .subscription(Overlay::subscription)
        .style(Overlay::style)
        .window(window::Settings {
            size: Size::new(WINDOW_WIDTH, WINDOW_HEIGHT),
            position: window::Position::SpecificWith(bottom_right),
            resizable: false,
            decorations: false,
            transparent: true,
            level: window::Level::AlwaysOnTop,
            platform_specific: platform_specific(),
            ..window::Settings::default()
        })
        .run_with(move || {
            let overlay = Overlay {
                counter_file,
                refresh,
                count: 0,
            };
            let task = overlay.reload();

            (overlay, task)
        })
}
