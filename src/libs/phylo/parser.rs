//! Newick reader built on nom.
//!
//! Text is first parsed into nested [`Clade`]s, which are then planted into
//! the arena of a [`Tree`] parents first, so node order is preorder.

use super::error::TreeError;
use super::node::NodeId;
use super::tree::Tree;
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{cut, map, map_res, opt, recognize},
    error::{context, ContextError, ErrorKind, FromExternalError, ParseError},
    multi::{many1, separated_list1},
    sequence::{delimited, preceded, terminated},
    IResult, Offset, Parser,
};

/// Characters that end an unquoted label
const RESERVED: &str = "():;,[]";

#[derive(Clone, Debug, PartialEq)]
enum Frame {
    Within(&'static str),
    Kind(ErrorKind),
}

/// nom error keeping every frame the failure passed through, innermost first.
#[derive(Clone, Debug, PartialEq)]
struct NewickError<'a> {
    trail: Vec<(&'a str, Frame)>,
}

impl<'a> NewickError<'a> {
    fn at(input: &'a str, frame: Frame) -> Self {
        Self {
            trail: vec![(input, frame)],
        }
    }

    fn push(mut self, input: &'a str, frame: Frame) -> Self {
        self.trail.push((input, frame));
        self
    }
}

impl<'a> ParseError<&'a str> for NewickError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::at(input, Frame::Kind(kind))
    }

    fn append(input: &'a str, kind: ErrorKind, other: Self) -> Self {
        other.push(input, Frame::Kind(kind))
    }
}

impl<'a> ContextError<&'a str> for NewickError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        other.push(input, Frame::Within(ctx))
    }
}

impl<'a, E> FromExternalError<&'a str, E> for NewickError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        Self::at(input, Frame::Kind(kind))
    }
}

type Res<'a, T> = IResult<&'a str, T, NewickError<'a>>;

/// One parsed node with its subtree, not yet in any arena.
#[derive(Debug, Default)]
struct Clade {
    name: Option<String>,
    length: Option<f64>,
    annotations: IndexMap<String, String>,
    children: Vec<Clade>,
}

impl Clade {
    fn sprout(&mut self, tree: &mut Tree) -> Result<NodeId, TreeError> {
        let id = tree.add_node();
        tree.set_branch_length(id, self.length)?;
        let node = &mut tree[id];
        node.name = self.name.take();
        node.properties = std::mem::take(&mut self.annotations);
        Ok(id)
    }

    /// Move the clade into `tree`, returning the id of its top node.
    /// Uses an explicit stack, so neither depth nor width is a problem.
    fn plant(mut self, tree: &mut Tree) -> Result<NodeId, TreeError> {
        let top = self.sprout(tree)?;
        let mut pending: Vec<(Clade, NodeId)> =
            self.children.into_iter().rev().map(|c| (c, top)).collect();

        while let Some((mut clade, parent)) = pending.pop() {
            let id = clade.sprout(tree)?;
            tree.add_child(parent, id)?;
            pending.extend(clade.children.into_iter().rev().map(|c| (c, id)));
        }
        Ok(top)
    }

    fn into_tree(self) -> Result<Tree, TreeError> {
        let mut tree = Tree::new();
        self.plant(&mut tree)?;
        Ok(tree)
    }
}

fn padded<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = NewickError<'a>>
where
    P: Parser<&'a str, Output = O, Error = NewickError<'a>>,
{
    delimited(multispace0, inner, multispace0)
}

fn label(input: &str) -> Res<'_, String> {
    context("label", alt((quoted('\''), quoted('"'), bare))).parse(input)
}

// Spaces around an unquoted label are dropped
fn bare(input: &str) -> Res<'_, String> {
    map(take_while(|c: char| !RESERVED.contains(c)), |s: &str| {
        s.trim().to_string()
    })
    .parse(input)
}

// 'It''s' reads as It's. Once the opening quote is seen, a missing closing
// one is a hard failure.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> Res<'a, String> {
    move |input: &'a str| {
        let (mut rest, _) = char::<&'a str, NewickError<'a>>(quote).parse(input)?;
        let mut text = String::new();
        loop {
            let Some(pos) = rest.find(quote) else {
                return Err(nom::Err::Failure(NewickError::at(
                    input,
                    Frame::Within("quoted label"),
                )));
            };
            text.push_str(&rest[..pos]);
            rest = &rest[pos + quote.len_utf8()..];
            match rest.strip_prefix(quote) {
                Some(after) => {
                    text.push(quote);
                    rest = after;
                }
                None => return Ok((rest, text)),
            }
        }
    }
}

fn number(input: &str) -> Res<'_, f64> {
    map_res(
        recognize((
            opt(char('-')),
            digit1,
            opt((char('.'), digit1)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        |s: &str| s.parse::<f64>(),
    )
    .parse(input)
}

// ":0.5". After the colon a number is mandatory.
fn length(input: &str) -> Res<'_, f64> {
    context("length", preceded(padded(char(':')), cut(number))).parse(input)
}

/// An optional bracketed comment, read as annotations.
///
/// `[&&NHX:k=v:flag]` and `[%k=v,flag]` keep bare flags with an empty value;
/// any other comment contributes its whitespace separated `k=v` pairs.
fn annotation(input: &str) -> Res<'_, IndexMap<String, String>> {
    let body = delimited(padded(char('[')), take_while(|c: char| c != ']'), char(']'));
    context(
        "comment",
        map(opt(body), |body: Option<&str>| {
            body.map(read_annotation).unwrap_or_default()
        }),
    )
    .parse(input)
}

fn read_annotation(body: &str) -> IndexMap<String, String> {
    if let Some(rest) = body.strip_prefix("&&NHX") {
        pairs(rest.split(':'), true)
    } else if let Some(rest) = body.strip_prefix('%') {
        pairs(rest.split(','), true)
    } else {
        pairs(body.split_whitespace(), false)
    }
}

fn pairs<'a>(parts: impl Iterator<Item = &'a str>, flags: bool) -> IndexMap<String, String> {
    let mut found = IndexMap::new();
    for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((key, value)) = part.split_once('=') {
            found.insert(key.to_string(), value.to_string());
        } else if flags {
            found.insert(part.to_string(), String::new());
        }
    }
    found
}

/// `(children)name[comment]:length[comment]`, every part optional.
fn clade(input: &str) -> Res<'_, Clade> {
    let children = delimited(
        padded(char('(')),
        separated_list1(padded(char(',')), clade),
        padded(char(')')),
    );
    let (input, children) = context("children", opt(children)).parse(input)?;
    let (input, name) = opt(label).parse(input)?;
    let (input, mut annotations) = annotation(input)?;
    let (input, length) = opt(length).parse(input)?;
    let (input, trailing) = annotation(input)?;
    annotations.extend(trailing);

    let clade = Clade {
        name: name.filter(|n| !n.is_empty()),
        length,
        annotations,
        children: children.unwrap_or_default(),
    };
    Ok((input, clade))
}

fn newick(input: &str) -> Res<'_, Clade> {
    terminated(padded(clade), padded(char(';'))).parse(input)
}

/// Parses one Newick tree. Text after the first `;` is ignored.
pub fn parse_newick(input: &str) -> Result<Tree, TreeError> {
    let (_, top) = newick(input).map_err(|e| located(input, e))?;
    top.into_tree()
}

/// Parses every tree of `input`.
///
/// Bracketed blocks between trees, such as file headers, are skipped.
pub fn parse_newick_multi(input: &str) -> Result<Vec<Tree>, TreeError> {
    let header = map(
        padded(delimited(char('['), take_while(|c: char| c != ']'), char(']'))),
        |_| None,
    );
    let (_, found) = many1(alt((map(newick, Some), header)))
        .parse(input)
        .map_err(|e| located(input, e))?;

    let trees = found
        .into_iter()
        .flatten()
        .map(Clade::into_tree)
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Parsed {} trees", trees.len());
    Ok(trees)
}

// Pin the innermost frame to a line and column of `input`
fn located(input: &str, err: nom::Err<NewickError<'_>>) -> TreeError {
    let trail = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.trail,
        nom::Err::Incomplete(_) => Vec::new(),
    };
    let at = trail
        .first()
        .map(|(rest, _)| *rest)
        .unwrap_or(&input[input.len()..]);

    let offset = input.offset(at);
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let column = offset - before.rfind('\n').map_or(0, |p| p + 1) + 1;

    let message = trail
        .iter()
        .rev()
        .map(|(_, frame)| match frame {
            Frame::Within(what) => format!("in {}", what),
            Frame::Kind(kind) => format!("{:?}", kind),
        })
        .collect::<Vec<_>>()
        .join(" > ");

    TreeError::ParseError {
        message,
        line,
        column,
        snippet: at.chars().take(50).collect(),
    }
}

impl Tree {
    /// Parse a Newick string into a Tree.
    ///
    /// ```
    /// use phylokit::libs::phylo::tree::Tree;
    /// let tree = Tree::from_newick("(A:0.1,B:0.2)Root;").unwrap();
    /// assert_eq!(tree.len(), 3);
    /// assert!(Tree::from_newick("(A,B:x)C;").is_err());
    /// ```
    pub fn from_newick(input: &str) -> Result<Self, TreeError> {
        parse_newick(input)
    }

    pub fn from_newick_multi(input: &str) -> Result<Vec<Self>, TreeError> {
        parse_newick_multi(input)
    }
}
