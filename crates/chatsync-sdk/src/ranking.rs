//! 联系人排序
//!
//! 最近有消息往来的联系人排在最前。纯内存结构，没有失败路径。

use crate::models::Contact;

/// 联系人排序列表
#[derive(Debug, Clone, Default)]
pub struct ContactRanking {
    contacts: Vec<Contact>,
}

impl ContactRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }

    /// 把联系人移到最前
    ///
    /// 不存在或已在首位时不做任何改动；其余联系人保持相对顺序。
    /// 返回是否发生了移动。
    pub fn promote(&mut self, contact_id: &str) -> bool {
        match self.position(contact_id) {
            Some(index) if index > 0 => {
                let contact = self.contacts.remove(index);
                self.contacts.insert(0, contact);
                true
            }
            _ => false,
        }
    }

    /// 整体替换（拉取到完整联系人列表时使用，原有顺序丢弃）
    pub fn replace_all(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    pub fn position(&self, contact_id: &str) -> Option<usize> {
        self.contacts.iter().position(|c| c.id == contact_id)
    }

    pub fn contains(&self, contact_id: &str) -> bool {
        self.position(contact_id).is_some()
    }

    pub fn get(&self, contact_id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == contact_id)
    }

    pub fn first(&self) -> Option<&Contact> {
        self.contacts.first()
    }

    pub fn as_slice(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn to_vec(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
