//! Recursive-descent reader for the plan notation.

use thiserror::Error;

use crate::build::{
    ActionPatternDesc, CompetenceDesc, CompetenceElementDesc, DriveCollectionDesc,
    DriveElementDesc, PlanDescription,
};
use crate::plan::{SenseReading, Trigger};
use crate::value::{Predicate, Value};

/// Syntax error with source position.
#[derive(Debug, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct Pos {
    line: usize,
    column: usize,
}

impl Pos {
    fn error(self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
enum Sexp {
    Atom(String, Pos),
    List(Vec<Sexp>, Pos),
}

impl Sexp {
    fn pos(&self) -> Pos {
        match self {
            Sexp::Atom(_, pos) | Sexp::List(_, pos) => *pos,
        }
    }

    fn atom(&self) -> Result<&str, ParseError> {
        match self {
            Sexp::Atom(text, _) => Ok(text),
            Sexp::List(_, pos) => Err(pos.error("expected a name, found a list")),
        }
    }

    fn list(&self) -> Result<&[Sexp], ParseError> {
        match self {
            Sexp::List(items, _) => Ok(items),
            Sexp::Atom(text, pos) => Err(pos.error(format!("expected a list, found \"{text}\""))),
        }
    }
}

/// Parse a plan file into an unlinked description.
pub fn parse(text: &str) -> Result<PlanDescription, ParseError> {
    let forms = read_forms(text)?;

    let mut competences = Vec::new();
    let mut patterns = Vec::new();
    let mut collection: Option<DriveCollectionDesc> = None;

    for form in &forms {
        let items = form.list()?;
        let head = items
            .first()
            .ok_or_else(|| form.pos().error("empty form"))?
            .atom()?;
        match head {
            "C" => competences.push(parse_competence(form)?),
            "AP" => patterns.push(parse_pattern(form)?),
            _ => {
                let parsed = parse_collection(form)?;
                if collection.is_some() {
                    return Err(form.pos().error("more than one drive collection"));
                }
                collection = Some(parsed);
            }
        }
    }

    let collection = collection.ok_or_else(|| {
        Pos { line: 1, column: 1 }.error("plan has no drive collection")
    })?;
    Ok(PlanDescription {
        collection,
        competences,
        patterns,
    })
}

// (KIND name [goal] (drives <level>+))
fn parse_collection(form: &Sexp) -> Result<DriveCollectionDesc, ParseError> {
    let items = form.list()?;
    let kind = items[0].atom()?.to_string();
    let name = items
        .get(1)
        .ok_or_else(|| form.pos().error("drive collection needs a name"))?
        .atom()?
        .to_string();

    let mut goal = None;
    let mut drives = None;
    for item in &items[2..] {
        let inner = item.list()?;
        match inner.first().and_then(|head| head.atom().ok()) {
            Some("goal") => goal = Some(parse_goal(item)?),
            Some("drives") => {
                let mut levels = Vec::new();
                for level in &inner[1..] {
                    let mut elements = Vec::new();
                    for element in level.list()? {
                        elements.push(parse_drive_element(element)?);
                    }
                    levels.push(elements);
                }
                drives = Some(levels);
            }
            _ => return Err(item.pos().error("expected (goal ...) or (drives ...)")),
        }
    }

    Ok(DriveCollectionDesc {
        kind,
        name,
        goal,
        drives: drives.ok_or_else(|| form.pos().error("drive collection has no drives"))?,
    })
}

// (name (trigger <readings>) target [freq])
fn parse_drive_element(form: &Sexp) -> Result<DriveElementDesc, ParseError> {
    let (name, trigger, target, bound) = parse_triggered_element(form)?;
    Ok(DriveElementDesc {
        name,
        trigger,
        target,
        max_freq: bound.filter(|&bound| bound >= 0),
    })
}

// (C name [goal] (elements <level>+))
fn parse_competence(form: &Sexp) -> Result<CompetenceDesc, ParseError> {
    let items = form.list()?;
    let name = items
        .get(1)
        .ok_or_else(|| form.pos().error("competence needs a name"))?
        .atom()?
        .to_string();

    let mut goal = None;
    let mut elements = None;
    for item in &items[2..] {
        let inner = item.list()?;
        match inner.first().and_then(|head| head.atom().ok()) {
            Some("goal") => goal = Some(parse_goal(item)?),
            Some("elements") => {
                let mut levels = Vec::new();
                for level in &inner[1..] {
                    let mut level_elements = Vec::new();
                    for element in level.list()? {
                        level_elements.push(parse_competence_element(element)?);
                    }
                    levels.push(level_elements);
                }
                elements = Some(levels);
            }
            _ => return Err(item.pos().error("expected (goal ...) or (elements ...)")),
        }
    }

    Ok(CompetenceDesc {
        name,
        goal,
        elements: elements.ok_or_else(|| form.pos().error("competence has no elements"))?,
    })
}

// (name (trigger <readings>) target [retries])
fn parse_competence_element(form: &Sexp) -> Result<CompetenceElementDesc, ParseError> {
    let (name, trigger, target, bound) = parse_triggered_element(form)?;
    Ok(CompetenceElementDesc {
        name,
        trigger,
        target,
        max_retries: bound.and_then(|bound| u32::try_from(bound).ok()),
    })
}

// (AP name (<element>+))
fn parse_pattern(form: &Sexp) -> Result<ActionPatternDesc, ParseError> {
    let items = form.list()?;
    let name = items
        .get(1)
        .ok_or_else(|| form.pos().error("action pattern needs a name"))?
        .atom()?
        .to_string();
    let body = items
        .get(2)
        .ok_or_else(|| form.pos().error("action pattern needs an element list"))?
        .list()?;
    let elements = body
        .iter()
        .map(|element| element.atom().map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    if items.len() > 3 {
        return Err(items[3].pos().error("unexpected form after element list"));
    }
    Ok(ActionPatternDesc { name, elements })
}

/// Shared shape of drive and competence elements: the trailing integer is
/// the frequency (resp. retry) bound; negative disables it.
fn parse_triggered_element(
    form: &Sexp,
) -> Result<(String, Trigger, String, Option<i64>), ParseError> {
    let items = form.list()?;
    if items.len() < 3 || items.len() > 4 {
        return Err(form
            .pos()
            .error("expected (name (trigger ...) target [bound])"));
    }
    let name = items[0].atom()?.to_string();
    let trigger_form = items[1].list()?;
    match trigger_form.first().and_then(|head| head.atom().ok()) {
        Some("trigger") if trigger_form.len() == 2 => {}
        _ => return Err(items[1].pos().error("expected (trigger (<readings>))")),
    }
    let trigger = parse_readings(&trigger_form[1])?;
    let target = items[2].atom()?.to_string();
    let bound = match items.get(3) {
        Some(atom) => Some(parse_int(atom)?),
        None => None,
    };
    Ok((name, trigger, target, bound))
}

// (goal <readings>)
fn parse_goal(form: &Sexp) -> Result<Trigger, ParseError> {
    let items = form.list()?;
    if items.len() != 2 {
        return Err(form.pos().error("expected (goal (<readings>))"));
    }
    parse_readings(&items[1])
}

// ((sense) (sense pred value) ...)
fn parse_readings(form: &Sexp) -> Result<Trigger, ParseError> {
    let mut readings = Vec::new();
    for reading in form.list()? {
        let items = reading.list()?;
        let sense = items
            .first()
            .ok_or_else(|| reading.pos().error("empty trigger reading"))?
            .atom()?
            .to_string();
        let reading = match items.len() {
            1 => SenseReading::new(sense),
            3 => {
                let symbol = items[1].atom()?;
                let predicate = Predicate::from_symbol(symbol)
                    .ok_or_else(|| items[1].pos().error(format!("unknown predicate \"{symbol}\"")))?;
                SenseReading::comparing(sense, predicate, parse_value(&items[2])?)
            }
            _ => {
                return Err(reading
                    .pos()
                    .error("expected (sense) or (sense predicate value)"));
            }
        };
        readings.push(reading);
    }
    Ok(Trigger::new(readings))
}

fn parse_value(form: &Sexp) -> Result<Value, ParseError> {
    let text = form.atom()?;
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Value::Int(int));
    }
    if let Ok(float) = text.parse::<f64>() {
        return Ok(Value::Float(float));
    }
    Err(form.pos().error(format!("expected a value, found \"{text}\"")))
}

fn parse_int(form: &Sexp) -> Result<i64, ParseError> {
    let text = form.atom()?;
    text.parse::<i64>()
        .map_err(|_| form.pos().error(format!("expected an integer, found \"{text}\"")))
}

/// Tokenize and group the top-level forms. `;` starts a comment running to
/// end of line.
fn read_forms(text: &str) -> Result<Vec<Sexp>, ParseError> {
    let mut stack: Vec<(Vec<Sexp>, Pos)> = Vec::new();
    let mut top = Vec::new();
    let mut atom = String::new();
    let mut atom_pos = Pos { line: 1, column: 1 };
    let mut pos = Pos { line: 1, column: 1 };
    let mut in_comment = false;

    fn flush(
        atom: &mut String,
        atom_pos: Pos,
        stack: &mut Vec<(Vec<Sexp>, Pos)>,
        top: &mut Vec<Sexp>,
    ) {
        if atom.is_empty() {
            return;
        }
        let sexp = Sexp::Atom(std::mem::take(atom), atom_pos);
        match stack.last_mut() {
            Some((items, _)) => items.push(sexp),
            None => top.push(sexp),
        }
    }

    for ch in text.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                pos.line += 1;
                pos.column = 1;
            }
            continue;
        }
        match ch {
            ';' => {
                flush(&mut atom, atom_pos, &mut stack, &mut top);
                in_comment = true;
            }
            '(' => {
                flush(&mut atom, atom_pos, &mut stack, &mut top);
                stack.push((Vec::new(), pos));
            }
            ')' => {
                flush(&mut atom, atom_pos, &mut stack, &mut top);
                let (items, open_pos) = stack
                    .pop()
                    .ok_or_else(|| pos.error("unbalanced \")\""))?;
                let sexp = Sexp::List(items, open_pos);
                match stack.last_mut() {
                    Some((parent, _)) => parent.push(sexp),
                    None => top.push(sexp),
                }
            }
            '\n' => {
                flush(&mut atom, atom_pos, &mut stack, &mut top);
                pos.line += 1;
                pos.column = 0;
            }
            ch if ch.is_whitespace() => {
                flush(&mut atom, atom_pos, &mut stack, &mut top);
            }
            ch => {
                if atom.is_empty() {
                    atom_pos = pos;
                }
                atom.push(ch);
            }
        }
        pos.column += 1;
    }
    flush(&mut atom, atom_pos, &mut stack, &mut top);

    if let Some((_, open_pos)) = stack.last() {
        return Err(open_pos.error("unbalanced \"(\""));
    }
    Ok(top)
}
