//! Statements issued against the `member` table.

pub const INSERT_MEMBER: &str = "insert into member(member_id, money) values(?,?)";
pub const UPDATE_MONEY: &str = "update member set money=? where member_id=?";
pub const DELETE_MEMBER: &str = "delete from member where member_id=?";
pub const SELECT_MEMBER: &str = "select * from member where member_id = ?";
