use std::path;

use tokio::io::AsyncBufReadExt;
use tracing::{event, Level};

use kvweave::config;
use kvweave::model::path as wpath;
use kvweave::model::property::PropertyValue;
use kvweave::model::tree::WidgetId;
use kvweave::session::{EditFlags, Session};

fn setup_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .pretty()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }
}

fn print_tree(session: &Session) {
    let root = match session.root() {
        Some(root) => root,
        None => {
            println!("(empty)");
            return;
        },
    };

    let tree = session.tree();
    for id in tree.iter() {
        let at = session.path_of(id);
        let depth = if id == root { 0 } else { at.len() };
        println!("{:indent$}{} [{}]", "", tree.class(id).unwrap_or("?"), wpath::format(&at), indent = depth * 2);
    }
}

fn widget_at(session: &Session, text: &str) -> Result<WidgetId, String> {
    let at = wpath::parse(text).ok_or_else(|| format!("bad path '{}'", text))?;
    session.widget_at(&at).ok_or_else(|| format!("nothing at {}", wpath::format(&at)))
}

fn parse_index(text: Option<&str>) -> Result<Option<usize>, String> {
    text.map(|t| t.parse::<usize>().map_err(|_| format!("bad index '{}'", t))).transpose()
}

enum Flow {
    Continue,
    Quit,
}

/// Runs one command line. Problems with the command itself come back as Err; problems the session
/// reports are printed from its status.
fn run_command(session: &mut Session, line: &str) -> Result<Flow, String> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let result = match command {
        "" => Ok(()),
        "quit" | "exit" => return Ok(Flow::Quit),
        "tree" => {
            print_tree(session);
            Ok(())
        },
        "text" => {
            print!("{}", session.document().text());
            Ok(())
        },
        "add" => {
            let class = args.first().ok_or("usage: add <Class> [parent-path] [index]")?;
            let parent = match args.get(1) {
                Some(p) => Some(widget_at(session, p)?),
                None => session.root(),
            };
            let index = parse_index(args.get(2).copied())?;
            let widget = session.create_widget(class);
            session.add_child(widget, parent, index, EditFlags::empty()).map(|_| {
                println!("added {} at {}", class, wpath::format(&session.path_of(widget)));
            })
        },
        "rm" => {
            let widget = widget_at(session, args.first().ok_or("usage: rm <path>")?)?;
            session.remove_child(widget, EditFlags::empty()).map(|removed| {
                if let Some(removed) = removed {
                    print!("{}", removed);
                }
            })
        },
        "mv" => {
            if args.len() < 3 {
                return Err("usage: mv <path> <parent-path> <index>".to_string());
            }
            let widget = widget_at(session, args[0])?;
            let parent = widget_at(session, args[1])?;
            let index = parse_index(Some(args[2]))?.unwrap_or(0);
            session.move_child(widget, parent, index, EditFlags::empty())
        },
        "set" => {
            if args.len() < 3 {
                return Err("usage: set <path> <property> <value>".to_string());
            }
            let widget = widget_at(session, args[0])?;
            let class = session.tree().class(widget).unwrap_or_default().to_string();
            let kind = session.catalog().property_kind(&class, args[1]);
            let value_text = rest.splitn(3, char::is_whitespace).nth(2).unwrap_or("").trim();
            let value = PropertyValue::from_markup(kind, value_text);
            session.set_property(widget, args[1], value, EditFlags::empty()).map(|_| ())
        },
        "get" => {
            if args.len() < 2 {
                return Err("usage: get <path> <property>".to_string());
            }
            let widget = widget_at(session, args[0])?;
            let written = session.get_property_text(widget, args[1]);
            written.map(|text| match (text, session.property(widget, args[1])) {
                (Some(text), _) => println!("{}", text),
                (None, Some(default)) => println!("{} (default)", default.to_markup()),
                (None, None) => println!("(unset)"),
            })
        },
        "type" => {
            let mut text = session.document().text().to_string();
            text.push_str(&rest.replace("\\n", "\n"));
            let state = session.user_edit(&text, std::time::Instant::now());
            event!(Level::DEBUG, "reload {:?}", state);
            Ok(())
        },
        "reload" => session.force_reload(true).map(|_| ()),
        "undo" => session.undo().map(|done| if !done { println!("nothing to undo") }),
        "redo" => session.redo().map(|done| if !done { println!("nothing to redo") }),
        "save" => match args.first() {
            Some(file) => session.save_as(file),
            None => session.save(),
        },
        "help" => {
            println!("commands: tree text add rm mv set get type reload undo redo save quit");
            Ok(())
        },
        other => return Err(format!("unknown command '{}'", other)),
    };

    if let Err(e) = result {
        println!("{}", e.message());
        print!("{}", e.detail());
    }

    Ok(Flow::Continue)
}

async fn run(mut session: Session, interval: std::time::Duration) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match run_command(&mut session, &line) {
                    Ok(Flow::Continue) => {},
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("{}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    event!(Level::ERROR, "reading commands failed: {}", e);
                    break;
                },
            },
            _ = ticker.tick() => {
                if let Some(Err(e)) = session.tick(std::time::Instant::now()) {
                    println!("{}", e.message());
                }
                if let Err(e) = session.poll_external() {
                    println!("{}", e.message());
                }
            },
        }
    }

    if session.document().is_dirty() {
        event!(Level::WARN, "quitting with unsaved changes");
    }
}

fn main() {
    let config = match config::Config::from_xdg() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("couldn't load configuration, using defaults: {}", e);
            config::Config::default()
        },
    };

    setup_tracing(config.tracing_level());
    *config::set() = config.clone();

    /* tokio intervals can't be zero */
    let interval = config.watch_interval().min(config.reload_delay()).max(std::time::Duration::from_millis(1));
    let mut session = Session::new(config);

    match std::env::args_os().nth(1) {
        Some(file) => {
            let file = path::PathBuf::from(file);
            if file.exists() {
                if let Err(e) = session.open(&file) {
                    println!("{}", e.message());
                    print!("{}", e.detail());
                }
            } else {
                event!(Level::INFO, "{} doesn't exist yet; `save {}` to create it", file.display(), file.display());
            }
        },
        None => event!(Level::INFO, "no file given; `save <file>` to keep the document"),
    }

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("couldn't start runtime: {}", e);
            std::process::exit(1);
        },
    };

    rt.block_on(run(session, interval));
}
