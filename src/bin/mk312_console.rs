use anyhow::{bail, Context, Result};
use std::io::Write;
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};
use std::sync::mpsc;
use std::time::Duration;

use mk312_proto::io::serial::{available_ports, open_serial};
use mk312_proto::io::{Config, Controller};
use mk312_proto::{ChannelId, ChannelParameters, Event, Frequency, PulseShape};

type Mk312 = Controller<Box<dyn serialport::SerialPort>>;

fn cmd_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    ports.iter().for_each(|p| println!("{}", p));
    Ok(())
}

fn cmd_open(args: &mut CmdScanner, mk312: &mut Mk312) -> Result<()> {
    let port = args.next()?;
    open_port(port, mk312)
}

fn open_port(port: &str, mk312: &mut Mk312) -> Result<()> {
    let serial = open_serial(port, mk312.config())?;
    let events = mk312.open(serial)?;
    print_events(&events);
    println!("Waiting for the box on {}", port);
    Ok(())
}

fn cmd_close(mk312: &mut Mk312) -> Result<()> {
    let (_port, event) = mk312.close();
    if let Some(event) = event {
        print_events(&[event]);
    }
    Ok(())
}

fn cmd_ramp(args: &mut CmdScanner, mk312: &mut Mk312) -> Result<()> {
    let events = mk312.set_ramp(args.parse_next()?);
    print_events(&events);
    Ok(())
}

// Commands changing one setting of a channel: <cmd> <a|b> <value>
fn cmd_channel(cmd: &str, args: &mut CmdScanner, mk312: &mut Mk312) -> Result<()> {
    let channel: ChannelId = args.parse_next()?;
    let mut params: ChannelParameters = *mk312.controls().channel(channel);
    match cmd {
        "gate" => {
            params.gate = match args.next()? {
                "on" | "1" => true,
                "off" | "0" => false,
                other => bail!("Expected on or off, got {}", other),
            }
        }
        "shape" => params.pulse_shape = PulseShape::from_weight(args.parse_next()?)?,
        "intensity" | "i" => params.intensity = args.parse_next()?,
        "freq" | "f" => params.frequency = Frequency::new(args.parse_next()?),
        "width" | "w" => params.pulse_width = args.parse_next()?,
        "send" => {}
        _ => bail!("Unknown channel command {}", cmd),
    }
    let events = mk312.update_channel(channel, params);
    print_events(&events);
    Ok(())
}

fn cmd_status(mk312: &Mk312) {
    println!("State: {:?}", mk312.state());
    let controls = mk312.controls();
    println!("Ramp: {}", controls.ramp());
    for channel in ChannelId::ALL {
        let p = controls.channel(channel);
        println!(
            "{}: gate {} shape {} intensity {} frequency {} width {}",
            channel,
            if p.gate { "on" } else { "off" },
            p.pulse_shape.weight(),
            p.intensity,
            *p.frequency,
            p.pulse_width
        );
    }
}

fn print_events(events: &[Event]) {
    for event in events {
        match event {
            Event::ChannelsEnabled(true) => println!("Channels enabled"),
            Event::ChannelsEnabled(false) => println!("Channels disabled"),
            Event::CommandAccepted => println!("OK"),
            Event::CommandRejected => println!("ERR"),
            Event::ConnectionLost(reason) => println!("Connection lost: {}", reason),
        }
    }
}

fn parse_args() -> Result<(Option<String>, Config)> {
    let mut config = Config::default();
    let mut port = None;
    let mut args = std::env::args();
    args.next(); // Skip program name
    while let Some(arg) = args.next() {
        if arg == "--timeout" {
            let secs: f32 = args
                .next()
                .context("--timeout needs a value")?
                .parse()
                .context("Parse error")?;
            config.handshake_timeout = Some(Duration::from_secs_f32(secs));
        } else {
            port = Some(arg);
        }
    }
    Ok((port, config))
}

fn main() -> Result<()> {
    env_logger::init();

    let (port, config) = parse_args()?;
    let poll_interval = config.poll_interval;
    let mut mk312 = Mk312::new(config);
    if let Some(port) = port {
        open_port(&port, &mut mk312)?;
    }

    let (line_tx, line_rx) = mpsc::channel::<String>();
    std::thread::spawn(move || loop {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        }
    });

    let mut stdout = std::io::stdout();
    print!(">> ");
    stdout.flush()?;
    loop {
        match line_rx.recv_timeout(poll_interval) {
            Ok(line) => {
                let mut scan = CmdScanner::new(&line);
                if let Err(err) = match scan.next() {
                    Err(_) => Ok(()),
                    Ok("quit") | Ok("q") => break,
                    Ok("ports") => cmd_ports(),
                    Ok("open") => cmd_open(&mut scan, &mut mk312),
                    Ok("close") => cmd_close(&mut mk312),
                    Ok("ramp") => cmd_ramp(&mut scan, &mut mk312),
                    Ok("status") => {
                        cmd_status(&mk312);
                        Ok(())
                    }
                    Ok(
                        cmd @ ("gate" | "shape" | "intensity" | "i" | "freq" | "f" | "width"
                        | "w" | "send"),
                    ) => cmd_channel(cmd, &mut scan, &mut mk312),
                    Ok(cmd) => {
                        println!("Unknown command {}", cmd);
                        Ok(())
                    }
                } {
                    println!("{:?}", err)
                }
                print!(">> ");
                stdout.flush()?;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        print_events(&mk312.poll());
    }
    cmd_close(&mut mk312)
}

struct CmdScanner<'a> {
    splt: Peekable<SplitWhitespace<'a>>,
}

impl<'a> CmdScanner<'a> {
    fn new(line: &'a str) -> Self {
        let splt = line.split_whitespace().peekable();
        Self { splt }
    }
    fn next(&mut self) -> Result<&'a str> {
        self.splt.next().context("End of stream")
    }
    fn parse_next<T: FromStr>(&mut self) -> Result<T> {
        self.next()?.parse::<T>().ok().context("Parse error")
    }
}
