//! Host natives: console and file I/O, the filesystem, processes, and time

use std::any::Any;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant, UNIX_EPOCH};

use chrono::{Local, TimeZone, Utc};
use core_types::Value;
use interpreter::{Args, Exception, NativeFn, Vm};
use memory_manager::HostResource;
use tracing::{debug, warn};

/// Natives installed by [`install`]
pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("basename", basename),
    ("cd", cd),
    ("clock", clock),
    ("close", close),
    ("ctime", ctime),
    ("cwd", cwd),
    ("dirname", dirname),
    ("exec", exec),
    ("exists", exists),
    ("exit", exit),
    ("input", input),
    ("ls", ls),
    ("md", md),
    ("open", open),
    ("print", print),
    ("rd", rd),
    ("read", read),
    ("rm", rm),
    ("sleep", sleep),
    ("spawn", spawn),
    ("stat", stat),
    ("system", system),
    ("time", time),
    ("whoami", whoami),
    ("write", write),
];

/// Path separator for the host platform
pub const PATH_SEPARATOR: &str = if cfg!(windows) { "\\" } else { "/" };

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Register the host natives and globals
///
/// `argv` becomes the script-visible `argv` array; `argv[0]` is
/// conventionally the script path.
pub fn install(vm: &mut Vm, argv: &[String]) {
    STARTED.get_or_init(Instant::now);
    for (name, function) in FUNCTIONS {
        vm.register_native(name, *function);
    }
    #[cfg(unix)]
    vm.register_native("fork", fork);

    let os = if cfg!(windows) { "windows" } else { "posix" };
    vm.set_global("os", Value::from(os));
    vm.set_global("pathsep", Value::from(PATH_SEPARATOR));

    for (name, stream) in [
        ("stdin", Stream::Stdin),
        ("stdout", Stream::Stdout),
        ("stderr", Stream::Stderr),
    ] {
        let handle = vm.alloc_resource(Box::new(FileHandle::new(name, stream)));
        vm.set_global(name, handle);
    }

    let args: Vec<Value> = argv.iter().map(|a| Value::from(a.as_str())).collect();
    vm.set_global("argc", Value::Number(args.len() as f64));
    let argv = vm.new_array(args);
    vm.set_global("argv", argv);

    if let Some(print) = vm.get_global("print") {
        let console = vm.new_object(vec![("log".to_string(), print)]);
        vm.set_global("console", console);
    }
}

// Handles

enum Stream {
    Stdin,
    Stdout,
    Stderr,
    File(Option<File>),
}

/// An open stream exposed to scripts as a resource
pub struct FileHandle {
    name: String,
    stream: Stream,
}

impl FileHandle {
    fn new(name: &str, stream: Stream) -> Self {
        Self {
            name: name.to_string(),
            stream,
        }
    }

    /// Display name: the path for files, the stream name otherwise
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the underlying stream can still be used
    pub fn is_open(&self) -> bool {
        !matches!(self.stream, Stream::File(None))
    }

    fn release(&mut self) -> io::Result<()> {
        if let Stream::File(file) = &mut self.stream {
            if let Some(mut file) = file.take() {
                file.flush()?;
                debug!(path = %self.name, "file closed");
            }
        }
        Ok(())
    }
}

impl HostResource for FileHandle {
    fn type_name(&self) -> &'static str {
        "file"
    }

    fn finalize(&mut self) -> Result<(), String> {
        self.release().map_err(|e| format!("{}: {}", self.name, e))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn io_error(vm: &mut Vm, subject: &str, err: io::Error) -> Exception {
    vm.error("Error", format!("{}: {}", subject, err))
}

fn handle_mut<'v>(vm: &'v mut Vm, args: &Args, index: usize) -> Result<&'v mut FileHandle, Exception> {
    let value = args.get(index);
    if vm.resource_mut::<FileHandle>(&value).is_none() {
        return Err(args.error(vm, format_args!("argument {} must be a file handle", index + 1)));
    }
    match vm.resource_mut::<FileHandle>(&value) {
        Some(handle) => Ok(handle),
        None => Err(Exception::internal("file handle vanished")),
    }
}

fn closed_error(vm: &mut Vm, name: &str) -> Exception {
    vm.error("Error", format!("{}: file is closed", name))
}

// Console

fn print(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let line = args.iter().map(|v| vm.display(v)).collect::<Vec<_>>().join(" ");
    writeln!(vm.output(), "{}", line).map_err(|e| io_error(vm, "print", e))?;
    Ok(Value::Null)
}

fn input(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("input", args);
    args.expect_range(vm, 0, 1)?;
    if let Some(prompt) = args.optional_string(vm, 0)? {
        let out = vm.output();
        let shown = write!(out, "{}", prompt).and_then(|_| out.flush());
        shown.map_err(|e| io_error(vm, "input", e))?;
    }
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| io_error(vm, "input", e))?;
    if read == 0 {
        return Ok(Value::Null);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Value::from(line))
}

// Files

fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut options = OpenOptions::new();
    match mode {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => options.write(true).create(true).truncate(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "a+" => options.read(true).append(true).create(true),
        _ => return None,
    };
    Some(options)
}

fn open(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("open", args);
    args.expect_range(vm, 1, 3)?;
    let path = args.string(vm, 0)?;
    let mode = args.optional_string(vm, 1)?;
    let mode = mode.as_deref().unwrap_or("r");
    let options = match open_options(mode) {
        Some(options) => options,
        None => return Err(args.error(vm, format_args!("invalid mode '{}'", mode))),
    };
    let callback = args.optional_function(vm, 2)?;
    let file = options.open(&*path).map_err(|e| io_error(vm, &path, e))?;
    debug!(path = %path, mode, "file opened");
    let handle = vm.alloc_resource(Box::new(FileHandle::new(&path, Stream::File(Some(file)))));

    let Some(callback) = callback else {
        return Ok(handle);
    };
    vm.push_root(handle.clone());
    let result = vm.call_value(&callback, &[handle.clone()]);
    let released = match vm.resource_mut::<FileHandle>(&handle) {
        Some(file) => file.release(),
        None => Ok(()),
    };
    let value = result?;
    released.map_err(|e| io_error(vm, &path, e))?;
    Ok(value)
}

fn close(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("close", args);
    args.expect_count(vm, 1)?;
    let handle = handle_mut(vm, &args, 0)?;
    let name = handle.name.clone();
    handle.release().map_err(|e| io_error(vm, &name, e))?;
    Ok(Value::Null)
}

/// Run `command` through the platform shell and capture its stdout
fn shell_output(command: &str) -> io::Result<String> {
    let output = shell(command).stderr(Stdio::inherit()).output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

fn read_handle(vm: &mut Vm, args: &Args) -> Result<String, Exception> {
    let handle = handle_mut(vm, args, 0)?;
    let name = handle.name.clone();
    let mut text = String::new();
    let result = match &mut handle.stream {
        Stream::Stdin => io::stdin().lock().read_to_string(&mut text),
        Stream::File(Some(file)) => file.read_to_string(&mut text),
        Stream::File(None) => return Err(closed_error(vm, &name)),
        Stream::Stdout | Stream::Stderr => {
            return Err(args.error(vm, format_args!("cannot read from {}", name)))
        }
    };
    result.map_err(|e| io_error(vm, &name, e))?;
    Ok(text)
}

fn read(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("read", args);
    args.expect_range(vm, 1, 3)?;
    let is_command = args.optional_boolean(vm, 1)?.unwrap_or(false);
    let callback = args.optional_function(vm, 2)?;

    let text = match args.get(0) {
        Value::String(source) if is_command => {
            debug!(command = %source, "reading command output");
            shell_output(&source).map_err(|e| io_error(vm, &source, e))?
        }
        Value::String(path) => {
            let file = File::open(&*path).map_err(|e| io_error(vm, &path, e))?;
            let mut text = String::new();
            BufReader::new(file)
                .read_to_string(&mut text)
                .map_err(|e| io_error(vm, &path, e))?;
            text
        }
        Value::Resource(_) => read_handle(vm, &args)?,
        other => {
            let message = format!("expected a path or file handle, got {}", other.type_of());
            return Err(args.error(vm, message));
        }
    };

    match callback {
        Some(callback) => {
            for line in text.lines() {
                vm.call_value(&callback, &[Value::from(line)])?;
            }
            Ok(Value::Null)
        }
        None => Ok(Value::from(text)),
    }
}

fn write(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("write", args);
    args.expect_range(vm, 2, 3)?;
    let (append, text) = if args.len() == 3 {
        (args.boolean(vm, 1)?, args.get(2))
    } else {
        (false, args.get(1))
    };
    let text = vm.display(&text);

    match args.get(0) {
        Value::String(path) => {
            let mut options = OpenOptions::new();
            if append {
                options.append(true).create(true);
            } else {
                options.write(true).create(true).truncate(true);
            }
            options
                .open(&*path)
                .and_then(|mut file| file.write_all(text.as_bytes()))
                .map_err(|e| io_error(vm, &path, e))?;
        }
        Value::Resource(_) => {
            let handle = handle_mut(vm, &args, 0)?;
            let name = handle.name.clone();
            let result = match &mut handle.stream {
                Stream::File(Some(file)) => file.write_all(text.as_bytes()),
                Stream::Stderr => io::stderr().write_all(text.as_bytes()),
                Stream::Stdout => vm.output().write_all(text.as_bytes()),
                Stream::File(None) => return Err(closed_error(vm, &name)),
                Stream::Stdin => return Err(args.error(vm, "cannot write to stdin")),
            };
            result.map_err(|e| io_error(vm, &name, e))?;
        }
        other => {
            let message = format!("expected a path or file handle, got {}", other.type_of());
            return Err(args.error(vm, message));
        }
    }
    Ok(Value::Null)
}

// Filesystem

fn ls(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("ls", args);
    args.expect_count(vm, 2)?;
    let dir = args.string(vm, 0)?;
    let callback = args.function(vm, 1)?;
    let mut entries = Vec::new();
    let listing = fs::read_dir(&*dir).map_err(|e| io_error(vm, &dir, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| io_error(vm, &dir, e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    for (name, is_dir) in entries {
        vm.call_value(&callback, &[Value::from(name), Value::Boolean(is_dir)])?;
    }
    Ok(Value::Null)
}

fn seconds(time: io::Result<std::time::SystemTime>) -> f64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64().floor())
}

fn stat(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("stat", args);
    args.expect_count(vm, 1)?;
    let path = args.string(vm, 0)?;
    let meta = fs::metadata(&*path).map_err(|e| io_error(vm, &path, e))?;

    #[cfg(unix)]
    let (uid, gid, ctime) = {
        use std::os::unix::fs::MetadataExt;
        (meta.uid() as f64, meta.gid() as f64, meta.ctime() as f64)
    };
    #[cfg(not(unix))]
    let (uid, gid, ctime) = (0.0, 0.0, seconds(meta.created()));

    let entries = vec![
        ("size".to_string(), Value::Number(meta.len() as f64)),
        ("atime".to_string(), Value::Number(seconds(meta.accessed()))),
        ("ctime".to_string(), Value::Number(ctime)),
        ("mtime".to_string(), Value::Number(seconds(meta.modified()))),
        ("uid".to_string(), Value::Number(uid)),
        ("gid".to_string(), Value::Number(gid)),
        ("isdir".to_string(), Value::Boolean(meta.is_dir())),
    ];
    Ok(vm.new_object(entries))
}

fn exists(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("exists", args);
    args.expect_count(vm, 1)?;
    let path = args.string(vm, 0)?;
    Ok(Value::Boolean(Path::new(&*path).exists()))
}

fn cwd(vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    let dir = std::env::current_dir().map_err(|e| io_error(vm, "cwd", e))?;
    Ok(Value::from(dir.to_string_lossy().into_owned()))
}

fn path_op(vm: &mut Vm, name: &str, values: &[Value], op: fn(&Path) -> io::Result<()>) -> Result<Value, Exception> {
    let args = Args::new(name, values);
    args.expect_count(vm, 1)?;
    let path = args.string(vm, 0)?;
    op(Path::new(&*path)).map_err(|e| io_error(vm, &path, e))?;
    Ok(Value::Null)
}

fn cd(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    path_op(vm, "cd", args, |p| std::env::set_current_dir(p))
}

fn md(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    path_op(vm, "md", args, |p| fs::create_dir(p))
}

fn rd(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    path_op(vm, "rd", args, |p| fs::remove_dir(p))
}

fn rm(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    path_op(vm, "rm", args, |p| fs::remove_file(p))
}

fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

/// Last path component, POSIX `basename` style
pub fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return &path[..1];
    }
    match trimmed.rfind(is_separator) {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Everything before the last path component, POSIX `dirname` style
pub fn dir_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { &path[..1] };
    }
    match trimmed.rfind(is_separator) {
        Some(i) => {
            let parent = trimmed[..i].trim_end_matches(is_separator);
            if parent.is_empty() {
                &path[..1]
            } else {
                parent
            }
        }
        None => ".",
    }
}

fn basename(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("basename", args);
    args.expect_count(vm, 1)?;
    let path = args.string(vm, 0)?;
    Ok(Value::from(base_name(&path)))
}

fn dirname(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("dirname", args);
    args.expect_count(vm, 1)?;
    let path = args.string(vm, 0)?;
    Ok(Value::from(dir_name(&path)))
}

// Time

fn clock(_vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    let started = STARTED.get_or_init(Instant::now);
    Ok(Value::Number(started.elapsed().as_secs_f64()))
}

fn time(_vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Number(Utc::now().timestamp_micros() as f64 / 1e6))
}

fn ctime(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("ctime", args);
    args.expect_range(vm, 0, 1)?;
    let stamp = match args.optional_number(vm, 0)? {
        Some(t) => t,
        None => Utc::now().timestamp() as f64,
    };
    match Local.timestamp_opt(stamp.floor() as i64, 0).single() {
        Some(local) => Ok(Value::from(local.format("%a %b %e %H:%M:%S %Y").to_string())),
        None => Err(vm.range_error(format!("ctime: timestamp {} is out of range", stamp))),
    }
}

fn sleep(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("sleep", args);
    args.expect_range(vm, 1, 3)?;
    let total = args.number(vm, 0)?;
    if !total.is_finite() || total < 0.0 {
        return Err(vm.range_error("sleep: duration must be a non-negative number"));
    }
    let callback = args.optional_function(vm, 1)?;
    let interval = args.optional_number(vm, 2)?.unwrap_or(1.0);

    let Some(callback) = callback else {
        std::thread::sleep(Duration::from_secs_f64(total));
        return Ok(Value::Null);
    };
    if !interval.is_finite() || interval <= 0.0 {
        return Err(vm.range_error("sleep: interval must be a positive number"));
    }
    let mut remaining = total;
    while remaining > 0.0 {
        let step = interval.min(remaining);
        std::thread::sleep(Duration::from_secs_f64(step));
        remaining -= step;
        vm.call_value(&callback, &[Value::Number(remaining.max(0.0))])?;
    }
    Ok(Value::Null)
}

// Processes

fn command_line(vm: &mut Vm, args: &Args) -> Result<Command, Exception> {
    if args.is_empty() {
        return Err(args.error(vm, "expected a program name"));
    }
    let program = args.string(vm, 0)?;
    let mut command = Command::new(&*program);
    for i in 1..args.len() {
        let value = args.get(i);
        command.arg(vm.display(&value));
    }
    Ok(command)
}

fn system(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("system", args);
    args.expect_count(vm, 1)?;
    let command = args.string(vm, 0)?;
    vm.output().flush().map_err(|e| io_error(vm, "system", e))?;
    let status = shell(&command).status().map_err(|e| io_error(vm, &command, e))?;
    Ok(Value::Number(f64::from(status.code().unwrap_or(-1))))
}

fn spawn(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("spawn", args);
    let mut command = command_line(vm, &args)?;
    let program = args.string(vm, 0)?;
    let child = command.spawn().map_err(|e| io_error(vm, &program, e))?;
    debug!(pid = child.id(), program = %program, "spawned process");
    Ok(Value::Number(f64::from(child.id())))
}

fn exec(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("exec", args);
    let mut command = command_line(vm, &args)?;
    let program = args.string(vm, 0)?;
    let output = command
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| io_error(vm, &program, e))?;
    if !output.status.success() {
        warn!(program = %program, status = ?output.status.code(), "command exited unsuccessfully");
    }
    Ok(Value::from(String::from_utf8_lossy(&output.stdout).into_owned()))
}

fn whoami(vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .map(Value::from)
        .ok_or_else(|| vm.error("Error", "whoami: cannot determine the current user"))
}

/// Clone the process; returns the child's pid in the parent and 0 in the child
#[cfg(unix)]
fn fork(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("fork", args);
    args.expect_count(vm, 0)?;
    vm.output().flush().map_err(|e| io_error(vm, "fork", e))?;
    // SAFETY: the interpreter is single-threaded, so the child holds no
    // locks owned by other threads.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io_error(vm, "fork", io::Error::last_os_error()));
    }
    debug!(pid, "forked");
    Ok(Value::Number(f64::from(pid)))
}

fn exit(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("exit", args);
    args.expect_range(vm, 0, 1)?;
    let status = args.optional_number(vm, 0)?.unwrap_or(0.0);
    if let Err(e) = vm.output().flush() {
        warn!(error = %e, "failed to flush output before exit");
    }
    Err(Exception::Exit(status as i32))
}
