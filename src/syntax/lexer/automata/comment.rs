use super::{
	string::{LongBracketMode, LongBracketOpen},
	Cursor,
	Root,
	State,
	Transition,
};


/// The state for lexing line comments.
#[derive(Debug)]
pub(super) struct Comment;


impl Comment {
	pub fn visit(self, cursor: &Cursor) -> Transition {
		match cursor.peek() {
			// Newline marks the end of the comment.
			Some(b'\n') => Transition::resume(Root),

			// Otherwise, eat everything.
			_ => Transition::step(self),
		}
	}
}


impl From<Comment> for State {
	fn from(state: Comment) -> State {
		State::Comment(state)
	}
}


/// The state right after the comment dashes, which decides between a long bracketed
/// comment and a plain line comment.
#[derive(Debug)]
pub(super) struct CommentOpen;


impl CommentOpen {
	pub fn visit(self, cursor: &Cursor) -> Transition {
		match cursor.peek() {
			Some(b'[') => Transition::step(
				LongBracketOpen::at(LongBracketMode::Comment, cursor)
			),

			_ => Transition::resume(Comment),
		}
	}
}


impl From<CommentOpen> for State {
	fn from(state: CommentOpen) -> State {
		State::CommentOpen(state)
	}
}
