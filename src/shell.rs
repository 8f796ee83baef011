//! Interactive command session.
//!
//! A small line-oriented shell over the running network, in the spirit of
//! the mininet CLI: `<node> <command...>` runs a command in that node's
//! namespace, a few built-ins describe the topology.
//!
//! Ctrl-C at the prompt ends the shell so the session can tear the network
//! down. Ctrl-C while a node command runs only interrupts that command.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::env::Environment;
use crate::topology::{AddressingReport, RealizedTopology};

/// Something that takes over once the network is up and addressed
pub trait InteractiveSession {
    fn run(
        &mut self,
        env: &mut dyn Environment,
        network: &RealizedTopology,
        report: &AddressingReport,
    ) -> io::Result<()>;
}

const HELP: &str = "\
Commands:
  nodes                  list nodes
  links                  list links in creation order
  net                    show the subnet assigned to each link
  <node> <command...>    run a shell command in the node's namespace
  help                   show this message
  exit | quit            leave the shell (Ctrl-D and Ctrl-C work too)
";

/// One event read by the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Line(String),
    Interrupt,
    Eof,
}

/// Where the shell gets its input from
pub trait InputSource {
    fn next_input(&mut self) -> io::Result<ShellInput>;

    /// Forget interrupts that arrived while a node command was running
    fn clear_interrupts(&mut self) {}
}

/// Plain line input, e.g. a file or an in-memory script
pub struct LineInput<R>(pub R);

impl<R: BufRead> InputSource for LineInput<R> {
    fn next_input(&mut self) -> io::Result<ShellInput> {
        let mut line = String::new();
        if self.0.read_line(&mut line)? == 0 {
            return Ok(ShellInput::Eof);
        }
        Ok(ShellInput::Line(line))
    }
}

/// Input fed through a channel, so interrupts can arrive while a read is pending
pub struct ChannelInput {
    rx: Receiver<ShellInput>,
    pending: VecDeque<ShellInput>,
}

impl ChannelInput {
    pub fn new(rx: Receiver<ShellInput>) -> Self {
        Self { rx, pending: VecDeque::new() }
    }

    /// Read stdin on a background thread and turn SIGINT/SIGTERM into
    /// [`ShellInput::Interrupt`]. The handler stays installed for the rest of
    /// the process, so a signal no longer kills it outright.
    pub fn stdin() -> Result<Self, ctrlc::Error> {
        let (tx, rx) = mpsc::channel();
        let interrupts = tx.clone();
        ctrlc::set_handler(move || {
            // the receiver is gone once the shell has returned
            let _ = interrupts.send(ShellInput::Interrupt);
        })?;
        spawn_stdin_reader(tx);
        Ok(Self::new(rx))
    }
}

fn spawn_stdin_reader(tx: Sender<ShellInput>) {
    std::thread::spawn(move || {
        let reader = BufReader::new(io::stdin());
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(ShellInput::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(ShellInput::Eof);
    });
}

impl InputSource for ChannelInput {
    fn next_input(&mut self) -> io::Result<ShellInput> {
        if let Some(input) = self.pending.pop_front() {
            return Ok(input);
        }
        // every sender dropped: nothing more will come
        Ok(self.rx.recv().unwrap_or(ShellInput::Eof))
    }

    fn clear_interrupts(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(ShellInput::Interrupt) => {}
                Ok(other) => self.pending.push_back(other),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.pending.retain(|input| *input != ShellInput::Interrupt);
    }
}

pub struct Shell<I, W> {
    input: I,
    output: W,
    prompt: String,
}

impl Shell<ChannelInput, io::Stdout> {
    /// Shell over the process's stdin/stdout, with Ctrl-C handling
    pub fn stdio() -> Result<Self, ctrlc::Error> {
        Ok(Self::with_input(ChannelInput::stdin()?, io::stdout()))
    }
}

impl<R: BufRead, W: Write> Shell<LineInput<R>, W> {
    pub fn new(input: R, output: W) -> Self {
        Self::with_input(LineInput(input), output)
    }
}

impl<I: InputSource, W: Write> Shell<I, W> {
    pub fn with_input(input: I, output: W) -> Self {
        Self { input, output, prompt: "linknet> ".to_string() }
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    /// Give back the writer, e.g. to inspect what a test session printed
    pub fn into_output(self) -> W {
        self.output
    }

    fn print_nodes(&mut self, network: &RealizedTopology) -> io::Result<()> {
        let names: Vec<&str> = network.topology().nodes().iter().map(|n| n.name.as_str()).collect();
        writeln!(self.output, "available nodes are: {}", names.join(" "))
    }

    fn print_links(&mut self, network: &RealizedTopology) -> io::Result<()> {
        let topology = network.topology();
        for link in topology.links() {
            writeln!(self.output, "{}: {}", link.ordinal, topology.describe_link(link))?;
        }
        Ok(())
    }

    fn print_net(&mut self, network: &RealizedTopology, report: &AddressingReport) -> io::Result<()> {
        let topology = network.topology();
        for link in topology.links() {
            match report.assignment(link.ordinal) {
                Some(a) => writeln!(
                    self.output,
                    "{}: {} {} {}={} {}={}",
                    link.ordinal,
                    a.cidr(),
                    topology.describe_link(link),
                    link.first().interface,
                    a.hosts[0],
                    link.second().interface,
                    a.hosts[1]
                )?,
                None => writeln!(self.output, "{}: unaddressed {}", link.ordinal, topology.describe_link(link))?,
            }
        }
        Ok(())
    }

    fn run_on_node(
        &mut self,
        env: &mut dyn Environment,
        network: &RealizedTopology,
        node: &str,
        command: &str,
    ) -> io::Result<()> {
        let Some(handle) = network.find_node(node) else {
            return writeln!(self.output, "*** Unknown command: {}", node);
        };
        if command.is_empty() {
            return writeln!(self.output, "*** Missing command for node {}", node);
        }

        let result = env.run_command(handle, command);
        // Ctrl-C during the command was meant for the command
        self.input.clear_interrupts();
        match result {
            Ok(out) => {
                write!(self.output, "{}", out.output)?;
                if !out.output.is_empty() && !out.output.ends_with('\n') {
                    writeln!(self.output)?;
                }
                if !out.success() {
                    writeln!(self.output, "(exit status {})", out.status)?;
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Command on {} failed: {}", node, e);
                writeln!(self.output, "*** {}", e)
            }
        }
    }
}

impl<I: InputSource, W: Write> InteractiveSession for Shell<I, W> {
    fn run(
        &mut self,
        env: &mut dyn Environment,
        network: &RealizedTopology,
        report: &AddressingReport,
    ) -> io::Result<()> {
        loop {
            write!(self.output, "{}", self.prompt)?;
            self.output.flush()?;

            let line = match self.input.next_input()? {
                ShellInput::Line(line) => line,
                ShellInput::Eof => {
                    writeln!(self.output)?;
                    return Ok(());
                }
                ShellInput::Interrupt => {
                    writeln!(self.output, "\nInterrupt")?;
                    log::info!("Interactive session interrupted");
                    return Ok(());
                }
            };

            let trimmed = line.trim();
            let (head, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((head, rest)) => (head, rest.trim()),
                None => (trimmed, ""),
            };

            match head {
                "" => {}
                "exit" | "quit" => return Ok(()),
                "help" | "?" => write!(self.output, "{}", HELP)?,
                "nodes" => self.print_nodes(network)?,
                "links" => self.print_links(network)?,
                "net" => self.print_net(network, report)?,
                node => self.run_on_node(env, network, node, rest)?,
            }
        }
    }
}
