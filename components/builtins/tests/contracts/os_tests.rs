//! Console, file, filesystem, process and time natives

use super::Session;
use core_types::{ErrorKind, Value};

fn quoted(path: &std::path::Path) -> String {
    format!("'{}'", path.display().to_string().replace('\\', "\\\\"))
}

#[test]
fn test_print_uses_display_form() {
    let mut s = Session::new();
    s.run("print('a', 1.5, [null, 'b'], {k: true}); print();");
    assert_eq!(s.output.text(), "a 1.5 [null,'b'] {'k':true}\n\n");
}

#[test]
fn test_console_log_aliases_print() {
    let mut s = Session::new();
    s.run("console.log('via', 'console');");
    assert_eq!(s.output.text(), "via console\n");
}

#[test]
fn test_host_globals() {
    let mut s = Session::with_argv(&["main.bn", "alpha", "beta"]);
    assert_eq!(s.show("return [argc, argv[2]];"), "[3,'beta']");
    assert_eq!(s.run("return typeof stdout;"), Value::from("resource"));
    let os = s.run("return os;");
    assert!(os == Value::from("posix") || os == Value::from("windows"));
    let sep = s.run("return pathsep;");
    assert!(sep == Value::from("/") || sep == Value::from("\\"));
}

#[test]
fn test_write_then_read_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = quoted(&dir.path().join("notes.txt"));
    let mut s = Session::new();
    s.run(&format!("write({p}, 'one\\n'); write({p}, true, 'two\\n');", p = path));
    assert_eq!(s.run(&format!("return read({});", path)), Value::from("one\ntwo\n"));
}

#[test]
fn test_read_line_callback() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("lines.txt");
    std::fs::write(&file, "x\ny\nz\n").unwrap();
    let mut s = Session::new();
    let source = format!(
        "let seen = []; let r = read({}, false, function(line) {{ push(seen, line); }}); return [r, seen];",
        quoted(&file)
    );
    assert_eq!(s.show(&source), "[null,['x','y','z']]");
}

#[test]
fn test_open_with_callback_closes_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = quoted(&dir.path().join("cb.txt"));
    let mut s = Session::new();
    let source = format!(
        r#"
        let kept = null;
        let r = open({p}, "w", function(f) {{ kept = f; write(f, "payload"); return 7; }});
        let closed = "";
        try {{ write(kept, "more"); }} catch (e) {{ closed = e.message; }}
        return [r, closed, read({p})];
        "#,
        p = path
    );
    let result = s.run(&source);
    let items = s.vm.array_elements(&result).unwrap();
    assert_eq!(items[0], Value::Number(7.0));
    assert!(s.vm.display(&items[1]).contains("file is closed"));
    assert_eq!(items[2], Value::from("payload"));
}

#[test]
fn test_open_callback_error_still_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = quoted(&dir.path().join("err.txt"));
    let mut s = Session::new();
    let source = format!(
        r#"
        let kept = null;
        try {{ open({p}, "w", function(f) {{ kept = f; throw "inside"; }}); }} catch (e) {{ }}
        try {{ write(kept, "x"); }} catch (e) {{ return e.message; }}
        "#,
        p = path
    );
    let message = s.run(&source);
    assert!(s.vm.display(&message).contains("file is closed"));
}

#[test]
fn test_handle_read_write_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = quoted(&dir.path().join("h.txt"));
    let mut s = Session::new();
    let source = format!(
        "let f = open({p}, 'w'); write(f, 'abc'); write(f, 1); close(f); close(f); \
         let g = open({p}); let t = read(g); close(g); return t;",
        p = path
    );
    assert_eq!(s.run(&source), Value::from("abc1"));
    assert!(s.error(&format!("open({}, 'rw');", path)).contains("invalid mode"));
}

#[test]
fn test_write_to_stdout_handle_is_captured() {
    let mut s = Session::new();
    s.run("write(stdout, 'raw'); print('!');");
    assert_eq!(s.output.text(), "raw!\n");
    assert!(s.error("read(stdout);").contains("cannot read"));
}

#[test]
fn test_unreferenced_handle_is_finalized() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("gc.txt");
    let mut s = Session::new();
    s.run(&format!("function leak() {{ let f = open({}, 'w'); write(f, 'kept'); }} leak();", quoted(&file)));
    s.vm.collect_garbage();
    assert_eq!(s.vm.gc_stats().finalizer_failures, 0);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "kept");
}

#[test]
fn test_directory_natives() {
    let dir = tempfile::tempdir().unwrap();
    let root = quoted(dir.path());
    let mut s = Session::new();
    let source = format!(
        r#"
        let root = {root};
        md(root + pathsep + "sub");
        write(root + pathsep + "b.txt", "12345");
        let names = [];
        ls(root, function(name, isdir) {{ push(names, name + (isdir ? "/" : "")); }});
        let info = stat(root + pathsep + "b.txt");
        let before = exists(root + pathsep + "sub");
        rd(root + pathsep + "sub");
        rm(root + pathsep + "b.txt");
        return [names, info.size, info.isdir, before, exists(root + pathsep + "sub"), exists(root + pathsep + "b.txt")];
        "#,
        root = root
    );
    assert_eq!(s.show(&source), "[['b.txt','sub/'],5,false,true,false,false]");
    assert!(s.error("rm('/definitely/not/here.txt');").starts_with("Error"));
}

#[test]
fn test_cwd_returns_a_directory() {
    let mut s = Session::new();
    assert_eq!(s.run("return stat(cwd()).isdir;"), Value::Boolean(true));
}

#[test]
fn test_basename_dirname() {
    let mut s = Session::new();
    assert_eq!(
        s.show("return [basename('/a/b.txt'), dirname('/a/b.txt'), basename(''), dirname('x')];"),
        "['b.txt','/a','.','.']"
    );
}

#[test]
fn test_time_natives() {
    let mut s = Session::new();
    assert_eq!(s.run("return time() > 1600000000;"), Value::Boolean(true));
    assert_eq!(s.run("return clock() >= 0;"), Value::Boolean(true));
    let stamp = s.run("return ctime(0);");
    assert!(matches!(stamp, Value::String(ref t) if t.contains("19")));
    assert_eq!(s.run("let n = 0; sleep(0.03125, function(left) { n++; }, 0.015625); return n;"), Value::Number(2.0));
    assert!(s.error("sleep(-1);").starts_with("RangeError"));
}

#[cfg(unix)]
#[test]
fn test_process_natives() {
    let mut s = Session::new();
    assert_eq!(s.run("return exec('echo', 'hi', 3);"), Value::from("hi 3\n"));
    assert_eq!(s.run("return system('exit 3');"), Value::Number(3.0));
    assert_eq!(s.run("return read('echo piped', true);"), Value::from("piped\n"));
    let pid = s.run("return spawn('true');");
    assert!(matches!(pid, Value::Number(n) if n > 0.0));
}

#[test]
fn test_exit_escapes_handlers() {
    let mut s = Session::new();
    let err = s.try_run("try { exit(2); } catch (e) { print('caught'); }").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Exit(2));
    assert_eq!(s.output.text(), "");
}
