use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info};

use inputd::config::Config;
use inputd::event_model::Event;
use inputd::seat::Seat;
use inputd::seat::backend::{SeatBackend, SeatEventSource};
use inputd::seat::backend_evdev::EvdevBackend;
use inputd::seat::backend_headless::HeadlessBackend;
use inputd::seat::backend_wayland::WaylandBackend;

/// 输入 seat 服务
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// 配置文件路径, 不给就全按默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 后端选择, auto 在有 WAYLAND_DISPLAY 时走 wayland, 否则 evdev
    #[arg(long, value_enum, default_value = "auto")]
    backend: BackendKind,

    /// 日志更啰嗦 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendKind {
    Auto,
    Evdev,
    Wayland,
    Headless,
}

#[derive(Subcommand)]
enum Command {
    /// 列出 seat 名下的设备
    ListDevices,
    /// 持续打印事件与信号
    Monitor,
    /// 打印 seat 当前状态
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let (backend, mut source) = open_backend(cli.backend)?;
    let seat = Seat::new(&config.seat.name, backend, config.pointer_a11y_settings());

    match cli.command {
        Command::ListDevices => list_devices(&seat),
        Command::Status => status(&seat),
        Command::Monitor => monitor(&seat, source.as_mut())?,
    }

    seat.destroy();
    Ok(())
}

fn open_backend(kind: BackendKind) -> anyhow::Result<(Box<dyn SeatBackend>, Box<dyn SeatEventSource>)> {
    match kind {
        BackendKind::Auto => {
            if std::env::var_os("WAYLAND_DISPLAY").is_some() {
                open_backend(BackendKind::Wayland)
            } else {
                open_backend(BackendKind::Evdev)
            }
        }
        BackendKind::Evdev => {
            let (backend, source) = EvdevBackend::open().context("opening the evdev backend")?;
            Ok((Box::new(backend), Box::new(source)))
        }
        BackendKind::Wayland => {
            let (backend, source) = WaylandBackend::connect()?;
            Ok((Box::new(backend), Box::new(source)))
        }
        BackendKind::Headless => {
            let (backend, handle) = HeadlessBackend::new();
            Ok((Box::new(backend), Box::new(handle)))
        }
    }
}

fn list_devices(seat: &Seat) {
    let devices = seat.list_devices();
    println!("seat {}: {} devices", seat.name(), devices.len());
    for device in devices {
        println!(
            "  {:>3}  {:<12}  {:<8}  {}",
            device.id().0,
            format!("{:?}", device.kind()).to_lowercase(),
            format!("{:?}", device.mode()).to_lowercase(),
            device.name()
        );
    }
}

fn status(seat: &Seat) {
    println!("seat:            {}", seat.name());
    println!("devices:         {}", seat.list_devices().len());
    println!("keymap layout:   {}", seat.keymap().layout());
    println!("caps lock:       {}", seat.keymap().caps_lock_state());
    println!("num lock:        {}", seat.keymap().num_lock_state());
    println!("touch mode:      {}", seat.touch_mode());
    println!("touchscreen:     {}", seat.has_touchscreen());
    println!("virtual types:   {:?}", seat.supported_virtual_device_types());

    // 抓一下立刻放掉, 看后端实际给到多少
    let granted = seat.grab(0);
    seat.ungrab(0);
    println!("grab grants:     {granted:?}");
}

fn monitor(seat: &Seat, source: &mut dyn SeatEventSource) -> anyhow::Result<()> {
    seat.connect(|_seat, signal| info!(?signal, "signal"));
    info!(seat = seat.name(), "monitoring, ctrl-c to stop");

    loop {
        let events = source.dispatch()?;
        if events.is_empty() {
            thread::sleep(Duration::from_millis(8));
            continue;
        }
        for event in events {
            println!("{}", describe(&event));
            seat.handle_event_post(&event);
        }
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::DeviceAdded(e) => format!("[{:>8}] added    {}", e.time_ms, e.device),
        Event::DeviceRemoved(e) => format!("[{:>8}] removed  {}", e.time_ms, e.device),
        Event::Motion(e) => format!(
            "[{:>8}] motion   {} ({:.1}, {:.1}) mods={:?}",
            e.time_ms, e.device, e.x, e.y, e.modifiers
        ),
        Event::Button(e) => format!(
            "[{:>8}] button   {} #{} {}",
            e.time_ms,
            e.device,
            e.button,
            if e.pressed { "down" } else { "up" }
        ),
        Event::Key(e) => format!(
            "[{:>8}] key      {} #{} {}",
            e.time_ms,
            e.device,
            e.key,
            if e.pressed { "down" } else { "up" }
        ),
        Event::Scroll(e) => format!(
            "[{:>8}] scroll   {} ({:.1}, {:.1})",
            e.time_ms, e.device, e.dx, e.dy
        ),
        Event::TouchBegin(e) => format!(
            "[{:>8}] touch+   {} seq={} ({:.1}, {:.1})",
            e.time_ms, e.device, e.sequence.0, e.x, e.y
        ),
        Event::TouchUpdate(e) => format!(
            "[{:>8}] touch~   {} seq={} ({:.1}, {:.1})",
            e.time_ms, e.device, e.sequence.0, e.x, e.y
        ),
        Event::TouchEnd(e) => format!(
            "[{:>8}] touch-   {} seq={}",
            e.time_ms, e.device, e.sequence.0
        ),
    }
}
